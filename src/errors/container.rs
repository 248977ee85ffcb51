use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum RegisterErrorKind {
    #[error("Invalid registration of {type_info}: {reason}")]
    InvalidArgument { type_info: TypeInfo, reason: &'static str },
    #[error("Can't register {type_info}: {unit} is disposed")]
    Disposed { type_info: TypeInfo, unit: &'static str },
}
