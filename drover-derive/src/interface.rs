use darling::FromAttributes;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, FnArg, Ident, ItemTrait, Pat, ReturnType, TraitItem, TraitItemFn, Type};

/// Per-method options: `#[call(method = "remoteName")]`
#[derive(Debug, Default, FromAttributes)]
#[darling(attributes(call))]
struct CallArgs {
    /// Remote method name, defaults to the Rust method name
    #[darling(default)]
    method: Option<String>,
}

pub fn expand(mut item: ItemTrait) -> darling::Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(darling::Error::custom("unit_interface traits cannot be generic")
            .with_span(&item.generics));
    }

    let mut errors = darling::Error::accumulator();
    for trait_item in item.items.iter_mut() {
        match trait_item {
            TraitItem::Fn(method) => {
                errors.handle(expand_method(method));
            }
            other => {
                errors.push(
                    darling::Error::custom("unit_interface traits may only contain methods")
                        .with_span(&*other),
                );
            }
        }
    }
    errors.finish()?;

    if item.colon_token.is_none() {
        item.colon_token = Some(Default::default());
    }
    item.supertraits.push(parse_quote!(::drover_api::Submitter));

    let name = &item.ident;
    Ok(quote! {
        #item

        impl<__Submitter: ::drover_api::Submitter + ?Sized> #name for __Submitter {}
    })
}

fn expand_method(method: &mut TraitItemFn) -> darling::Result<()> {
    let options = CallArgs::from_attributes(&method.attrs)?;
    method.attrs.retain(|attr| !attr.path().is_ident("call"));

    let sig = &method.sig;
    if method.default.is_some() {
        return Err(darling::Error::custom("interface methods must not have a body").with_span(sig));
    }
    if sig.asyncness.is_some() {
        return Err(darling::Error::custom(
            "declare interface methods without `async`; the generated method returns a future",
        )
        .with_span(sig));
    }
    if !sig.generics.params.is_empty() {
        return Err(darling::Error::custom("interface methods cannot be generic").with_span(&sig.generics));
    }
    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(darling::Error::custom("interface methods must take `&self`").with_span(sig));
        }
    }

    let mut idents: Vec<Ident> = Vec::new();
    for input in sig.inputs.iter().skip(1) {
        match input {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => idents.push(pat_ident.ident.clone()),
                other => {
                    return Err(darling::Error::custom("arguments must be plain identifiers").with_span(other));
                }
            },
            FnArg::Receiver(receiver) => {
                return Err(darling::Error::unexpected_type("receiver").with_span(receiver));
            }
        }
    }

    let output: Type = match &sig.output {
        ReturnType::Default => parse_quote!(()),
        ReturnType::Type(_, ty) => (**ty).clone(),
    };
    let remote = options.method.unwrap_or_else(|| sig.ident.to_string());

    method.sig.output = parse_quote! {
        -> ::drover_api::BoxedFuture<'static, ::drover_api::PoolResult<#output>>
    };
    method.default = Some(parse_quote! {{
        let __args = match (|| -> ::std::result::Result<
            ::std::vec::Vec<::drover_api::Value>,
            ::drover_api::serde_json::Error,
        > {
            ::std::result::Result::Ok(::std::vec![
                #( ::drover_api::serde_json::to_value(&#idents)? ),*
            ])
        })() {
            ::std::result::Result::Ok(args) => args,
            ::std::result::Result::Err(error) => {
                return ::std::boxed::Box::pin(::std::future::ready(::std::result::Result::Err(
                    ::drover_api::PoolError::InvalidArgument(error.to_string()),
                )));
            }
        };
        let __pending = ::drover_api::Submitter::submit_call(self, #remote, __args);
        ::std::boxed::Box::pin(async move {
            let value = __pending.await?;
            ::drover_api::serde_json::from_value::<#output>(value)
                .map_err(|error| ::drover_api::PoolError::Decode(error.to_string()))
        })
    }});
    method.semi_token = None;

    Ok(())
}
