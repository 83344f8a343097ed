use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, parse_macro_input, spanned::Spanned};

/// Marks a synchronous test that starts from the default hook registry.
///
/// Expands to `#[test]` and resets `multitude::hooks` before the body runs, so
/// a hook installed by one test never leaks into the next test scheduled on
/// the same thread.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(raw_args.span(), "multitude_macro::test does not take arguments")
        .to_compile_error(),
    );
  }

  if let Some(asyncness) = input.sig.asyncness {
    return TokenStream::from(
      syn::Error::new(
        asyncness.span(),
        "multitude_macro::test only supports synchronous tests: the multitude core never \
         suspends",
      )
      .to_compile_error(),
    );
  }

  let ItemFn { attrs, vis, sig, block } = input;
  let expanded = quote! {
      #[test]
      #(#attrs)*
      #vis #sig {
          ::multitude::hooks::reset();
          #block
      }
  };

  TokenStream::from(expanded)
}
