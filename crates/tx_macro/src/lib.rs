extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, PatType, Receiver};

/// Makes a state-changing entry point atomic.
///
/// The annotated method must take `&mut self` (the world state, which must be
/// `Clone`) and an argument named `exec` exposing `journal_len()` and
/// `truncate_journal(usize)`. On `Err` the world is restored to the snapshot
/// taken before the call and events emitted by the call are dropped.
#[proc_macro_attribute]
pub fn tx(_args: TokenStream, input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    let vis = &input_fn.vis;
    let block = &input_fn.block;
    let attrs = &input_fn.attrs;
    let fn_name = &input_fn.sig.ident;
    let fn_args = &input_fn.sig.inputs;
    let fn_return = &input_fn.sig.output;
    let asyncness = &input_fn.sig.asyncness;

    let mut arg_list = Vec::new();
    for arg in fn_args {
        match arg {
            FnArg::Receiver(Receiver {
                reference: Some(_),
                mutability: Some(_),
                ..
            }) => arg_list.push(quote!(self)),
            FnArg::Receiver(receiver) => {
                return syn::Error::new_spanned(receiver, "#[tx] needs a `&mut self` receiver")
                    .to_compile_error()
                    .into();
            }
            FnArg::Typed(PatType { pat, .. }) => arg_list.push(quote!(#pat)),
        }
    }
    if !matches!(fn_args.first(), Some(FnArg::Receiver(_))) {
        return syn::Error::new_spanned(&input_fn.sig, "#[tx] applies to methods only")
            .to_compile_error()
            .into();
    }

    let wrapped_fn_name = quote::format_ident!("{}_inner", fn_name);
    let call = if asyncness.is_some() {
        quote! { Self::#wrapped_fn_name(#(#arg_list),*).await }
    } else {
        quote! { Self::#wrapped_fn_name(#(#arg_list),*) }
    };

    let gen = quote! {
        #[doc(hidden)]
        #vis #asyncness fn #wrapped_fn_name(#fn_args) #fn_return {
            #block
        }

        #(#attrs)*
        #vis #asyncness fn #fn_name(#fn_args) #fn_return {
            let checkpoint = ::std::clone::Clone::clone(&*self);
            let journal = exec.journal_len();
            match #call {
                Ok(result) => Ok(result),
                Err(e) => {
                    *self = checkpoint;
                    exec.truncate_journal(journal);
                    Err(e)
                }
            }
        }
    };

    TokenStream::from(gen)
}
