/// Shared callable unit behind constructors, providers and finalizers.
///
/// Calls take `&self`: one boxed service is invoked from every scope and thread that resolves through it.
pub(crate) trait Service<Request: ?Sized> {
    type Response;
    type Error;

    fn call(&self, request: Request) -> Result<Self::Response, Self::Error>;
}

impl<'a, S: Service<Request> + 'a + ?Sized, Request> Service<Request> for &'a S {
    type Response = S::Response;
    type Error = S::Error;

    #[inline]
    fn call(&self, request: Request) -> Result<Self::Response, Self::Error> {
        (**self).call(request)
    }
}
