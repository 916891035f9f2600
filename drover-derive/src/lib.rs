use proc_macro::TokenStream;
use proc_macro2::Span;
use syn::{parse_macro_input, ItemTrait};

mod common;
mod interface;

/// Turns a trait into a typed proxy over any `drover_api::Submitter`.
///
/// Every method is declared without a body and without `async`. The macro
/// gives each one a default implementation that serializes the arguments with
/// `serde_json`, submits them under the method's name, and decodes the result
/// into the declared return type. A blanket implementation then makes the
/// trait available on every submitter, including `drover::WorkerPool`.
///
/// # Example
///
/// ```rust,ignore
/// use drover_api::unit_interface;
///
/// #[unit_interface]
/// pub trait Imaging {
///     fn resize(&self, path: String, width: u32) -> String;
///
///     // Remote method name differs from the Rust name
///     #[call(method = "healthCheck")]
///     fn health_check(&self) -> bool;
/// }
///
/// // let thumbnail = pool.resize("cat.png".into(), 128).await?;
/// ```
///
/// # Generated Signatures
///
/// `fn resize(&self, path: String, width: u32) -> String` becomes
/// `fn resize(&self, path: String, width: u32) -> BoxedFuture<'static, PoolResult<String>>`.
/// Argument serialization failures resolve immediately to
/// `PoolError::InvalidArgument`; undecodable results to `PoolError::Decode`.
#[proc_macro_attribute]
pub fn unit_interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return common::to_compile_error(syn::Error::new(
            Span::call_site(),
            "unit_interface takes no arguments",
        ));
    }

    let item = parse_macro_input!(item as ItemTrait);
    match interface::expand(item) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(errors) => TokenStream::from(errors.write_errors()),
    }
}
