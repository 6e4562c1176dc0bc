//! Navigation bar and cart popup state.
//!
//! Presentation only: nothing here grants access. The cart button opens the
//! sidebar for signed-in viewers and the login prompt for everyone else.
//! Controls are plain links carrying a `?cart=` action, applied server-side.

use crate::models::CartItem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item, merging quantities when the sku is already present.
    pub fn add(&mut self, item: CartItem) {
        match self.items.iter_mut().find(|i| i.sku == item.sku) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total_cents(&self) -> i64 {
        self.items.iter().map(CartItem::line_total_cents).sum()
    }
}

/// What the cart button revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartView {
    Sidebar,
    LoginPrompt,
}

/// A nav control activated by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    Open,
    Close,
    Dismiss,
}

impl CartAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(CartAction::Open),
            "close" => Some(CartAction::Close),
            "dismiss" => Some(CartAction::Dismiss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavWidget {
    signed_in: bool,
    sidebar_open: bool,
    login_prompt_open: bool,
    pub cart: Cart,
}

impl NavWidget {
    pub fn for_viewer(signed_in: bool) -> Self {
        Self {
            signed_in,
            ..Self::default()
        }
    }

    pub fn open_cart(&mut self) -> CartView {
        if self.signed_in {
            self.sidebar_open = true;
            self.login_prompt_open = false;
            CartView::Sidebar
        } else {
            self.login_prompt_open = true;
            self.sidebar_open = false;
            CartView::LoginPrompt
        }
    }

    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::Open => {
                self.open_cart();
            }
            CartAction::Close => self.close_sidebar(),
            CartAction::Dismiss => self.dismiss_login_prompt(),
        }
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_open = false;
    }

    pub fn dismiss_login_prompt(&mut self) {
        self.login_prompt_open = false;
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn login_prompt_open(&self) -> bool {
        self.login_prompt_open
    }

    /// Renders the nav fragment. Closed panels carry the `hidden` attribute.
    pub fn render(&self) -> String {
        let hidden = |open: bool| if open { "" } else { " hidden" };
        let auth_link = if self.signed_in {
            r#"<form method="post" action="/session/logout"><button type="submit">Log out</button></form>"#
        } else {
            r#"<a href="/login.html">Log in</a>"#
        };
        format!(
            concat!(
                "<nav class=\"storefront-nav\">",
                "<a id=\"cart-button\" href=\"?cart=open\">Cart ({count})</a>",
                "{auth_link}",
                "<aside id=\"cart-sidebar\"{sidebar}>Total: {total} ",
                "<a id=\"cart-close\" href=\"?cart=close\">Close</a></aside>",
                "<div id=\"login-prompt\" role=\"dialog\"{prompt}>",
                "Please log in to view your cart. <a href=\"/login.html\">Log in</a> ",
                "<a id=\"login-prompt-dismiss\" href=\"?cart=dismiss\">Dismiss</a>",
                "</div>",
                "</nav>"
            ),
            count = self.cart.item_count(),
            auth_link = auth_link,
            sidebar = hidden(self.sidebar_open),
            total = format_cents(self.cart.total_cents()),
            prompt = hidden(self.login_prompt_open),
        )
    }
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
