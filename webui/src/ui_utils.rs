use js_sys::Date;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::types::{ReceiptStatus, WarrantyStatus};

/// Warranties are assumed to run one year when the product carries no length.
pub const DEFAULT_WARRANTY_DAYS: f64 = 365.0;

// Format an amount as dollars with two decimals, e.g. "$5420.50"
pub fn fmt_money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}

// CSS chip class per receipt processing state
pub fn receipt_status_class(status: ReceiptStatus) -> &'static str {
    match status {
        ReceiptStatus::Processed => "chip chip-success",
        ReceiptStatus::Processing => "chip chip-warning",
        ReceiptStatus::Failed => "chip chip-error",
    }
}

pub fn warranty_status_class(status: WarrantyStatus) -> &'static str {
    match status {
        WarrantyStatus::Active => "chip chip-success",
        WarrantyStatus::Expiring => "chip chip-warning",
        WarrantyStatus::Expired => "chip chip-error",
    }
}

/// Share of a one-year warranty still left, clamped to 0..=100 percent.
pub fn warranty_progress(days_remaining: i64) -> f64 {
    (days_remaining as f64 / DEFAULT_WARRANTY_DAYS * 100.0).clamp(0.0, 100.0)
}

/// Split a reminder list like "30, 7, 1"; `None` if any entry is not a day count.
pub fn parse_reminder_days(raw: &str) -> Option<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok())
        .collect()
}

// Render an ISO date (YYYY-MM-DD) in the browser's locale
pub fn fmt_date(iso: &str) -> String {
    let d = Date::new(&JsValue::from_str(iso));
    if d.get_time().is_nan() {
        return iso.to_string();
    }
    d.to_locale_date_string("default", &JsValue::UNDEFINED).into()
}

// Show a transient toast in the #toasts container
pub fn show_toast(message: &str) {
    let Some(win) = web_sys::window() else { return };
    let Some(doc) = win.document() else { return };
    let Some(container) = doc.get_element_by_id("toasts") else { return };
    let Ok(toast) = doc.create_element("div") else { return };

    toast.set_class_name("toast fade-in");
    toast.set_text_content(Some(message));
    if container.append_child(&toast).is_err() {
        return;
    }

    let cb = Closure::wrap(Box::new(move || {
        let _ = container.remove_child(&toast);
    }) as Box<dyn FnMut()>);
    let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), 2500);
    cb.forget();
}
