use proc_macro::TokenStream;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, parse_macro_input, spanned::Spanned};

/// Marks a test function of the rxlab test suite.
///
/// Sync functions expand to a plain `#[test]`. Async functions run on a tokio
/// runtime: `#[rxlab_macro::test]` and `#[rxlab_macro::test(current)]` use a
/// current-thread runtime, `#[rxlab_macro::test(threaded)]` a multi-threaded
/// one.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let is_async = input.sig.asyncness.is_some();

  let raw_args = proc_macro2::TokenStream::from(attr);
  let tokio_args = if raw_args.is_empty() {
    proc_macro2::TokenStream::new()
  } else {
    if !is_async {
      return TokenStream::from(
        syn::Error::new(
          raw_args.span(),
          "rxlab_macro::test runtime args are only supported for async tests. Use \
           #[rxlab_macro::test] for sync tests, or make the function async.",
        )
        .to_compile_error(),
      );
    }

    let flavor = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
      Some((ident.to_string(), ident.span()))
    } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
      Some((lit.value(), lit.span()))
    } else {
      None
    };

    match flavor {
      Some((name, _)) if name == "current" => quote!(flavor = "current_thread"),
      Some((name, _)) if name == "threaded" => quote!(flavor = "multi_thread"),
      Some((_, span)) => {
        return TokenStream::from(
          syn::Error::new(
            span,
            "rxlab_macro::test only accepts: #[rxlab_macro::test], \
             #[rxlab_macro::test(current)] or #[rxlab_macro::test(threaded)]",
          )
          .to_compile_error(),
        );
      }
      None => {
        return TokenStream::from(
          syn::Error::new(
            raw_args.span(),
            "rxlab_macro::test expects an identifier or a string literal",
          )
          .to_compile_error(),
        );
      }
    }
  };

  let attr = if is_async { quote!(#[tokio::test(#tokio_args)]) } else { quote!(#[test]) };

  let expanded = quote! {
      #attr
      #input
  };

  TokenStream::from(expanded)
}
