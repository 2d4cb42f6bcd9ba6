use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::parse::Parser;
use syn::{Expr, ExprAssign, ExprLit, ItemStruct, Lit};

/// Declares a tag type.
///
/// ```ignore
/// #[pyliquid::tag("print,echo", mode = "python", void = true, start = "varname")]
/// #[derive(Default)]
/// struct Echo;
/// ```
///
/// Keys: `mode` (`standard`/`liquid`/`python`), `void`, `start` (`none`,
/// `expr`, `varname`, `exprlist`, `assign`, `for`, `raw`), `parents` (comma
/// list of openers, makes the tag a clause), `terminal`, `inside` (comma
/// list of required ancestors). The struct must implement `Tag` and `Default`.
#[proc_macro_attribute]
pub fn tag(attr: TokenStream, item: TokenStream) -> TokenStream {
    let st = match syn::parse::<ItemStruct>(item) {
        Ok(st) => st,
        Err(e) => return e.to_compile_error().into(),
    };
    match parse_args_ts(attr).and_then(|args| expand(args, &st)) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct TagArgs {
    names: Option<String>,
    mode: Option<String>,
    void: bool,
    start: Option<String>,
    parents: Option<String>,
    terminal: bool,
    inside: Option<String>,
}

fn parse_args_ts(attr: TokenStream) -> syn::Result<TagArgs> {
    let ts: proc_macro2::TokenStream = attr.into();
    let parser = syn::punctuated::Punctuated::<Expr, syn::Token![,]>::parse_terminated;
    let exprs = parser.parse2(ts)?;
    let mut args = TagArgs::default();
    for e in exprs {
        match e {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => args.names = Some(s.value()),
            Expr::Assign(ExprAssign { left, right, .. }) => {
                let key = match *left {
                    Expr::Path(p) => p.path.get_ident().map(|i| i.to_string()).unwrap_or_default(),
                    _ => String::new(),
                };
                let Expr::Lit(ExprLit { lit, .. }) = *right else {
                    return Err(syn::Error::new(Span::call_site(), format!("`{}` expects a literal", key)));
                };
                match (key.as_str(), lit) {
                    ("names", Lit::Str(s)) => args.names = Some(s.value()),
                    ("mode", Lit::Str(s)) => args.mode = Some(s.value()),
                    ("start", Lit::Str(s)) => args.start = Some(s.value()),
                    ("parents", Lit::Str(s)) => args.parents = Some(s.value()),
                    ("inside", Lit::Str(s)) => args.inside = Some(s.value()),
                    ("void", Lit::Bool(b)) => args.void = b.value,
                    ("terminal", Lit::Bool(b)) => args.terminal = b.value,
                    (key, lit) => {
                        return Err(syn::Error::new(lit.span(), format!("unsupported tag option `{}`", key)));
                    }
                }
            }
            other => {
                return Err(syn::Error::new_spanned(other, "expected a string literal or `key = value`"));
            }
        }
    }
    Ok(args)
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand(args: TagArgs, st: &ItemStruct) -> syn::Result<proc_macro2::TokenStream> {
    let name = &st.ident;
    let names = args
        .names
        .ok_or_else(|| syn::Error::new(Span::call_site(), "missing tag names, e.g. #[tag(\"echo\")]"))?;

    let mode = match args.mode.as_deref().unwrap_or("standard") {
        "standard" | "liquid" => quote! { ::pyliquid::Mode::Standard },
        "python" => quote! { ::pyliquid::Mode::Python },
        other => return Err(syn::Error::new(Span::call_site(), format!("unknown mode `{}`", other))),
    };

    let start = match args.start.as_deref().unwrap_or("none") {
        "none" => quote! { None },
        "expr" => quote! { Expr },
        "varname" => quote! { VarName },
        "exprlist" => quote! { ExprList },
        "assign" => quote! { Assign },
        "for" => quote! { For },
        "raw" => quote! { Raw },
        other => return Err(syn::Error::new(Span::call_site(), format!("unknown start `{}`", other))),
    };

    let mut chain = quote! { .start(::pyliquid::tags::Start::#start) };
    if args.void {
        chain.extend(quote! { .void() });
    }
    if let Some(parents) = args.parents {
        let parents = split_list(&parents);
        chain.extend(quote! { .clause_of(&[#(#parents),*]) });
    }
    if args.terminal {
        chain.extend(quote! { .terminal() });
    }
    if let Some(inside) = args.inside {
        let inside = split_list(&inside);
        chain.extend(quote! { .inside(&[#(#inside),*]) });
    }

    Ok(quote! {
        #st
        impl ::pyliquid::tags::TagDefinition for #name {
            const NAMES: &'static str = #names;
            const MODE: ::pyliquid::Mode = #mode;

            fn descriptor() -> ::pyliquid::tags::TagDescriptor {
                ::pyliquid::tags::TagDescriptor::new(<Self as ::core::default::Default>::default())
                    #chain
            }
        }
    })
}
