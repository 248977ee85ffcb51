use crate::any::TypeInfo;

/// Config for a registration
/// ## Fields
/// - `singleton`:
///   If `true`, one value is built per owning container and shared by every scope.
///   Otherwise each scope builds its own value on first resolution.
///
/// - `include_base`:
///   If `true`, the registration is also bound under every interface the type declares.
///
/// - `priority`:
///   A registration replaces an existing binding for the same key only if its priority is greater than or equal.
///
/// - `alias_as`:
///   Registers under this key instead of the type's own. Must be one of the type's declared interfaces.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Config {
    pub singleton: bool,
    pub include_base: bool,
    pub priority: i32,
    pub alias_as: Option<TypeInfo>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            singleton: false,
            include_base: true,
            priority: 0,
            alias_as: None,
        }
    }
}
