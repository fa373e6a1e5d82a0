use serde::{Deserialize, Serialize};

use crate::fingerprint::Platform;

/// Ordered selector strategies per interaction concern. Interaction steps try
/// these before their generic heuristics; an empty concern is never allowed,
/// so the generic bundle always remains operable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorBundle {
    pub add_to_cart: Vec<String>,
    pub variant_picker: Vec<String>,
    pub cart_drawer: Vec<String>,
    pub cart_icon: Vec<String>,
    pub checkout_button: Vec<String>,
    pub view_cart: Vec<String>,
    pub product_form: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SelectorBundle {
    /// Platform-agnostic bundle; every concern must stay populated.
    pub fn generic() -> Self {
        Self {
            add_to_cart: owned(&[
                "button[name='add']",
                "[data-add-to-cart]",
                "button.add-to-cart",
                ".product-form__submit",
                "#AddToCart",
                ".single_add_to_cart_button",
                "form[action*='/cart/add'] [type='submit']",
            ]),
            variant_picker: owned(&[
                "variant-radios input[type='radio']",
                ".product-form__input input[type='radio']",
                "select[name*='option']",
                ".product-options select",
                ".swatch input[type='radio']",
            ]),
            cart_drawer: owned(&[
                "cart-drawer",
                "#CartDrawer",
                ".cart-drawer",
                "[data-cart-drawer]",
                ".mini-cart",
                ".drawer--cart",
            ]),
            cart_icon: owned(&[
                "#cart-icon-bubble",
                "a[href='/cart']",
                "[data-cart-icon]",
                ".cart-link",
                "a[href*='/cart']",
            ]),
            checkout_button: owned(&[
                "button[name='checkout']",
                "input[name='checkout']",
                "[data-checkout-button]",
                ".checkout-button",
                "a[href*='/checkout']",
                "#checkout",
            ]),
            view_cart: owned(&[
                "a[href='/cart']",
                "[data-view-cart]",
                ".view-cart",
                ".cart__view",
            ]),
            product_form: owned(&[
                "form[action*='/cart/add']",
                "form.product-form",
                "form[data-product-form]",
                "form.cart",
            ]),
        }
    }

    /// Bundle specialized for a recognized platform, with optional
    /// theme-level overrides layered on top.
    pub fn for_platform(platform: Platform, theme: Option<&str>) -> Self {
        let mut bundle = match platform {
            Platform::Shopify => {
                let mut bundle = Self::generic();
                bundle.add_to_cart = owned(&[
                    "form[action*='/cart/add'] button[name='add']",
                    "button[name='add']",
                    ".product-form__submit",
                    "[data-add-to-cart]",
                    "#AddToCart",
                ]);
                bundle.cart_drawer = owned(&[
                    "cart-drawer",
                    "#CartDrawer",
                    ".cart-drawer",
                    "#cart-notification",
                ]);
                bundle.checkout_button = owned(&[
                    "button[name='checkout']",
                    "input[name='checkout']",
                    ".cart__checkout-button",
                    "a[href*='/checkout']",
                ]);
                bundle.product_form = owned(&[
                    "form[action*='/cart/add']",
                    "product-form form",
                    "form[data-type='add-to-cart-form']",
                ]);
                bundle
            }
            Platform::WooCommerce => {
                let mut bundle = Self::generic();
                bundle.add_to_cart = owned(&[
                    ".single_add_to_cart_button",
                    "button[name='add-to-cart']",
                    ".add_to_cart_button",
                ]);
                bundle.variant_picker = owned(&[
                    "table.variations select",
                    ".variations_form select",
                ]);
                bundle.view_cart = owned(&[
                    "a.added_to_cart",
                    ".woocommerce-message a.button",
                    "a[href*='/cart']",
                ]);
                bundle.checkout_button = owned(&[
                    "a.checkout-button",
                    ".wc-proceed-to-checkout a",
                    "a[href*='/checkout']",
                ]);
                bundle.product_form = owned(&["form.cart", "form.variations_form"]);
                bundle
            }
            Platform::BigCommerce => {
                let mut bundle = Self::generic();
                bundle.add_to_cart = owned(&[
                    "#form-action-addToCart",
                    "[data-button-type='add-cart']",
                    ".add-to-cart-button",
                ]);
                bundle.checkout_button = owned(&[
                    ".cart-actions .button--primary",
                    "a[href*='/checkout']",
                ]);
                bundle
            }
            _ => Self::generic(),
        };

        if let Some(theme) = theme {
            apply_theme_overrides(&mut bundle, platform, theme);
        }
        bundle
    }
}

/// Small per-theme refinements on top of the platform bundle.
fn apply_theme_overrides(bundle: &mut SelectorBundle, platform: Platform, theme: &str) {
    if platform != Platform::Shopify {
        return;
    }
    match theme {
        "dawn" => {
            bundle.cart_drawer = owned(&["cart-drawer", "#cart-notification"]);
            bundle.cart_icon = owned(&["#cart-icon-bubble", "a[href='/cart']"]);
            bundle.variant_picker = owned(&[
                "variant-radios input[type='radio']",
                "variant-selects select",
            ]);
        }
        "impulse" | "motion" => {
            bundle.cart_drawer = owned(&["#CartDrawer", ".site-header__cart"]);
            bundle.cart_icon = owned(&[".site-header__cart", "a[href='/cart']"]);
        }
        "prestige" => {
            bundle.cart_drawer = owned(&["#sidebar-cart", ".Drawer--fromRight"]);
        }
        _ => {}
    }
}
