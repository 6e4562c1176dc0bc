use crate::{
    models::{CartItem, Order, OrderStatus},
    widget::format_cents,
};

/// Static orders shown on the cashier till.
pub fn demo_orders() -> Vec<Order> {
    vec![
        Order {
            id: "ORD-1001".to_string(),
            customer: "Ada Lovelace".to_string(),
            items: vec![
                CartItem {
                    sku: "TEA-EARL".to_string(),
                    name: "Earl Grey, 100g".to_string(),
                    unit_price_cents: 650,
                    quantity: 2,
                },
                CartItem {
                    sku: "MUG-STD".to_string(),
                    name: "Stoneware mug".to_string(),
                    unit_price_cents: 1200,
                    quantity: 1,
                },
            ],
            status: OrderStatus::Paid,
        },
        Order {
            id: "ORD-1002".to_string(),
            customer: "Grace Hopper".to_string(),
            items: vec![CartItem {
                sku: "COF-ESP".to_string(),
                name: "Espresso beans, 250g".to_string(),
                unit_price_cents: 899,
                quantity: 3,
            }],
            status: OrderStatus::Pending,
        },
    ]
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders orders as an HTML table, one row per line item.
pub fn render_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return r#"<p class="orders-empty">No orders yet.</p>"#.to_string();
    }

    let mut html = String::from(
        "<table class=\"orders\"><thead><tr><th>Order</th><th>Customer</th><th>Item</th>\
         <th>Qty</th><th>Line total</th><th>Status</th></tr></thead><tbody>",
    );
    for order in orders {
        for item in &order.items {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&order.id),
                escape_html(&order.customer),
                escape_html(&item.name),
                item.quantity,
                format_cents(item.line_total_cents()),
                order.status.label(),
            ));
        }
        html.push_str(&format!(
            "<tr class=\"order-total\"><td colspan=\"4\">{} total</td><td>{}</td><td></td></tr>",
            escape_html(&order.id),
            format_cents(order.total_cents()),
        ));
    }
    html.push_str("</tbody></table>");
    html
}
