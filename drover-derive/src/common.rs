// Common utility functions shared across the macros

/// Convert a syn::Error to a TokenStream that can be returned from a proc_macro function
pub fn to_compile_error(error: syn::Error) -> proc_macro::TokenStream {
    error.to_compile_error().into()
}
