#![allow(non_snake_case)]

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident};

/// Which native driver a device object is destroyed through.
enum DriverKind {
    Vulkan,
    Dx12,
}

impl DriverKind {
    fn parse(attr: TokenStream) -> Result<Self, syn::Error> {
        if attr.is_empty() {
            return Err(syn::Error::new(
                Span::call_site(),
                "DeviceObject: expected a backend argument, `#[DeviceObject(vulkan)]` or `#[DeviceObject(dx12)]`",
            ));
        }
        let ident: Ident = syn::parse(attr)?;
        match ident.to_string().as_str() {
            "vulkan" => Ok(DriverKind::Vulkan),
            "dx12" => Ok(DriverKind::Dx12),
            other => Err(syn::Error::new(
                ident.span(),
                format!("DeviceObject: unknown backend `{other}`, expected `vulkan` or `dx12`"),
            )),
        }
    }

    fn driver_trait(&self) -> proc_macro2::TokenStream {
        match self {
            DriverKind::Vulkan => quote! { dyn crate::vulkan::VulkanDriver },
            DriverKind::Dx12 => quote! { dyn crate::dx12::Dx12Driver },
        }
    }
}

/// Injects `pub(crate) driver: Arc<dyn ...Driver>` into a struct that owns a native object,
/// and implements the crate-private `DeviceObject` trait for it.
#[proc_macro_attribute]
pub fn DeviceObject(attr: TokenStream, item: TokenStream) -> TokenStream {
    let kind = match DriverKind::parse(attr) {
        Ok(kind) => kind,
        Err(e) => return e.to_compile_error().into(),
    };

    let input = parse_macro_input!(item as syn::ItemStruct);
    let ident = input.ident.clone();
    let generics = input.generics.clone();
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut output_struct = input.clone();

    let syn::Fields::Named(fields_named) = &mut output_struct.fields else {
        return syn::Error::new(
            output_struct.span(),
            "DeviceObject only supports structs with named fields",
        )
        .to_compile_error()
        .into();
    };

    if fields_named.named.iter().any(|f| f.ident.as_ref().is_some_and(|id| id == "driver")) {
        return syn::Error::new(
            fields_named.span(),
            "DeviceObject: struct already has a `driver` field; remove it and let the macro inject it",
        )
        .to_compile_error()
        .into();
    }

    let driver_trait = kind.driver_trait();
    let driver_field: syn::Field = syn::parse_quote! {
        pub(crate) driver: ::std::sync::Arc<#driver_trait>
    };
    fields_named.named.push(driver_field);

    let expanded = quote! {
        #output_struct

        impl #impl_generics crate::device::sealed::Sealed for #ident #ty_generics #where_clause {}

        impl #impl_generics crate::device::DeviceObject for #ident #ty_generics #where_clause {
            type Driver = #driver_trait;

            #[inline]
            fn driver(&self) -> &::std::sync::Arc<#driver_trait> { &self.driver }
        }
    };

    expanded.into()
}
