use dioxus::prelude::*;

use dioxus_router::prelude::*;

mod api;
mod auth_service;
mod types;
mod ui_utils;
use types::{DashboardStats, ProductRow, ReceiptRow, ReceiptStatus, WarrantyStatus};
use ui_utils::{fmt_date, fmt_money, receipt_status_class, show_toast, warranty_progress, warranty_status_class};

// ----- Routing -----
#[derive(Routable, Clone, Debug, PartialEq)]
#[rustfmt::skip]
pub enum Route {
    #[route("/login")]
    Login {},
    #[route("/register")]
    Register {},
    #[layout(Protected)]
        #[redirect("/", || Route::Dashboard {})]
        #[route("/dashboard")]
        Dashboard {},
        #[route("/receipts")]
        Receipts {},
        #[route("/products")]
        Products {},
        #[route("/settings")]
        Settings {},
        #[route("/:..segments")]
        Fallback { segments: Vec<String> },
    #[end_layout]
}

// Placeholder content until the pages read from the API
const STATS: DashboardStats = DashboardStats { total_receipts: 45, total_products: 128, expiring_soon: 7, total_value: 5420.50 };

fn mock_receipts() -> Vec<ReceiptRow> {
    vec![
        ReceiptRow { id: "1", merchant_name: "Best Buy", date: "2024-01-15", total: 299.99, status: ReceiptStatus::Processed, products_count: 2 },
        ReceiptRow { id: "2", merchant_name: "Target", date: "2024-01-12", total: 45.67, status: ReceiptStatus::Processing, products_count: 0 },
        ReceiptRow { id: "3", merchant_name: "Home Depot", date: "2024-01-10", total: 125.50, status: ReceiptStatus::Processed, products_count: 3 },
    ]
}

fn mock_products() -> Vec<ProductRow> {
    vec![
        ProductRow { id: "1", name: "iPhone 15 Pro", brand: "Apple", purchase_date: "2024-01-15", warranty_end_date: "2025-01-15", days_remaining: 280, status: WarrantyStatus::Active },
        ProductRow { id: "2", name: "MacBook Pro 16\"", brand: "Apple", purchase_date: "2024-01-10", warranty_end_date: "2025-01-10", days_remaining: 275, status: WarrantyStatus::Active },
        ProductRow { id: "3", name: "Samsung 4K TV", brand: "Samsung", purchase_date: "2023-12-01", warranty_end_date: "2024-12-01", days_remaining: 30, status: WarrantyStatus::Expiring },
    ]
}

pub fn main() {
    console_error_panic_hook::set_once();
    dioxus_web::launch::launch(app, vec![], Default::default());
}

fn app() -> Element {
    rsx! {
        div {
            Router::<Route> {}
            // Toast container for notifications
            div { id: "toasts", class: "toast-container" }
        }
    }
}

// ----- Layout for signed-in pages -----
#[component]
fn Protected() -> Element {
    let nav = use_navigator();
    let signed_in = api::is_authenticated();

    use_effect(move || {
        if !signed_in {
            nav.replace(Route::Login {});
        }
    });
    if !signed_in {
        return rsx! {};
    }

    let logout = move |_| {
        spawn(async move {
            auth_service::logout().await;
            nav.replace(Route::Login {});
        });
    };

    rsx! {
        div { class: "app-header",
            div { class: "container",
                div { class: "brand", span { "Receipt & Warranty Tracker" } }
                nav {
                    Link { to: Route::Dashboard {}, "Dashboard" }
                    Link { to: Route::Receipts {}, "Receipts" }
                    Link { to: Route::Products {}, "Products" }
                    Link { to: Route::Settings {}, "Settings" }
                    button { class: "btn", onclick: logout, "Logout" }
                }
            }
        }
        main { class: "container", Outlet::<Route> {} }
    }
}

#[component]
fn Fallback(segments: Vec<String>) -> Element {
    let _ = segments;
    let nav = use_navigator();
    use_effect(move || {
        nav.replace(Route::Dashboard {});
    });
    rsx! {}
}

// ----- Auth pages -----
#[component]
fn Login() -> Element {
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut busy = use_signal(|| false);
    let nav = use_navigator();

    let submit = move |ev: FormEvent| {
        ev.prevent_default();
        let creds = types::LoginCredentials { email: email.read().trim().to_string(), password: password.read().clone() };
        if creds.email.is_empty() || creds.password.is_empty() {
            show_toast("Please enter your email and password");
            return;
        }
        busy.set(true);
        spawn(async move {
            match auth_service::login(&creds).await {
                Ok(_) => { nav.replace(Route::Dashboard {}); }
                Err(e) => show_toast(&format!("Sign in failed: {}", e)),
            }
            busy.set(false);
        });
    };

    rsx! {
        section { class: "panel auth-panel",
            h2 { "Sign in" }
            form { onsubmit: submit,
                input { r#type: "email", placeholder: "Email", value: "{email}", oninput: move |e| email.set(e.value()) }
                input { r#type: "password", placeholder: "Password", value: "{password}", oninput: move |e| password.set(e.value()) }
                button { class: "btn btn-primary", r#type: "submit", disabled: *busy.read(), "Sign in" }
            }
            p { "No account yet? " Link { to: Route::Register {}, "Register" } }
        }
    }
}

#[component]
fn Register() -> Element {
    let mut first_name = use_signal(String::new);
    let mut last_name = use_signal(String::new);
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut busy = use_signal(|| false);
    let nav = use_navigator();

    let submit = move |ev: FormEvent| {
        ev.prevent_default();
        let optional = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        let creds = types::RegisterCredentials {
            email: email.read().trim().to_string(),
            password: password.read().clone(),
            first_name: optional(&first_name.read()),
            last_name: optional(&last_name.read()),
        };
        if creds.email.is_empty() || creds.password.is_empty() {
            show_toast("Email and password are required");
            return;
        }
        busy.set(true);
        spawn(async move {
            match auth_service::register(&creds).await {
                Ok(_) => { nav.replace(Route::Dashboard {}); }
                Err(e) => show_toast(&format!("Registration failed: {}", e)),
            }
            busy.set(false);
        });
    };

    rsx! {
        section { class: "panel auth-panel",
            h2 { "Create account" }
            form { onsubmit: submit,
                input { placeholder: "First name", value: "{first_name}", oninput: move |e| first_name.set(e.value()) }
                input { placeholder: "Last name", value: "{last_name}", oninput: move |e| last_name.set(e.value()) }
                input { r#type: "email", placeholder: "Email", value: "{email}", oninput: move |e| email.set(e.value()) }
                input { r#type: "password", placeholder: "Password", value: "{password}", oninput: move |e| password.set(e.value()) }
                button { class: "btn btn-primary", r#type: "submit", disabled: *busy.read(), "Register" }
            }
            p { "Already registered? " Link { to: Route::Login {}, "Sign in" } }
        }
    }
}

// ----- Dashboard -----
#[component]
fn StatCard(title: &'static str, value: String, color: &'static str) -> Element {
    rsx! {
        div { class: "card stat-card",
            div { class: "stat-value", style: "color:{color};", "{value}" }
            div { class: "muted", "{title}" }
        }
    }
}

#[component]
fn Dashboard() -> Element {
    rsx! {
        section { class: "panel",
            h2 { "Dashboard" }
            p { class: "muted", "Welcome to your Receipt & Warranty Tracker" }
            div { class: "grid grid-4",
                StatCard { title: "Total Receipts", value: STATS.total_receipts.to_string(), color: "#1976d2" }
                StatCard { title: "Total Products", value: STATS.total_products.to_string(), color: "#2e7d32" }
                StatCard { title: "Expiring Soon", value: STATS.expiring_soon.to_string(), color: "#d32f2f" }
                StatCard { title: "Total Value", value: fmt_money(STATS.total_value), color: "#7b1fa2" }
            }
            div { class: "grid grid-2",
                div { class: "card",
                    h3 { "Recent Activity" }
                    p { class: "muted", "No recent activity. Start by uploading your first receipt!" }
                }
                div { class: "card",
                    h3 { "Quick Actions" }
                    div { class: "stack",
                        button { class: "btn btn-primary", "Upload Receipt" }
                        button { class: "btn", "Add Product Manually" }
                        button { class: "btn", "View Warranties" }
                    }
                }
            }
        }
    }
}

// ----- Receipts -----
#[component]
fn Receipts() -> Element {
    let receipts = mock_receipts();

    rsx! {
        section { class: "panel",
            div { class: "toolbar",
                div {
                    h2 { "Receipts" }
                    p { class: "muted", "Manage and view all your uploaded receipts" }
                }
                button { class: "btn btn-primary", "Upload Receipt" }
            }
            if receipts.is_empty() {
                div { class: "card empty",
                    h3 { "No receipts uploaded yet" }
                    p { class: "muted", "Upload your first receipt to start tracking your purchases and warranties" }
                    button { class: "btn btn-primary", "Upload Your First Receipt" }
                }
            } else {
                table { class: "table",
                    thead {
                        tr {
                            th { "Merchant" }
                            th { "Date" }
                            th { class: "num", "Total" }
                            th { "Status" }
                            th { class: "center", "Products" }
                            th { class: "center", "Actions" }
                        }
                    }
                    tbody {
                        for r in receipts {
                            tr { key: "{r.id}",
                                td { "{r.merchant_name}" }
                                td { "{fmt_date(r.date)}" }
                                td { class: "num", "{fmt_money(r.total)}" }
                                td { span { class: receipt_status_class(r.status), "{r.status.label()}" } }
                                td { class: "center", "{r.products_count}" }
                                td { class: "center", button { class: "btn btn-small", "View" } }
                            }
                        }
                    }
                }
            }
        }
    }
}

// ----- Products -----
#[component]
fn Products() -> Element {
    let products = mock_products();

    rsx! {
        section { class: "panel",
            div { class: "toolbar",
                div {
                    h2 { "Products" }
                    p { class: "muted", "Track warranty status for all your registered products" }
                }
                button { class: "btn btn-primary", "Add Product" }
            }
            if products.is_empty() {
                div { class: "card empty",
                    h3 { "No products registered yet" }
                    p { class: "muted", "Add products manually or upload receipts to start tracking warranties" }
                    button { class: "btn btn-primary", "Add Your First Product" }
                }
            } else {
                div { class: "grid grid-3",
                    for p in products {
                        div { key: "{p.id}", class: "card product-card",
                            div { class: "product-image", title: "{p.name}", "No Image" }
                            h3 { "{p.name}" }
                            p { class: "muted", "{p.brand}" }
                            span { class: warranty_status_class(p.status),
                                if p.status == WarrantyStatus::Expiring { "⚠ " }
                                "{p.status.label()}"
                            }
                            p { "Purchased: {fmt_date(p.purchase_date)}" }
                            p { "Warranty expires: {fmt_date(p.warranty_end_date)}" }
                            div { class: "progress-label",
                                span { "Warranty Status" }
                                span { "{p.days_remaining} days left" }
                            }
                            progress {
                                class: if p.status == WarrantyStatus::Expiring { "progress warning" } else { "progress" },
                                max: "100",
                                value: "{warranty_progress(p.days_remaining)}",
                            }
                            div { class: "card-actions",
                                button { class: "btn btn-small", "View Details" }
                                button { class: "btn btn-small", "Download Manual" }
                            }
                        }
                    }
                }
            }
        }
    }
}

// ----- Settings -----
const SETTINGS_TABS: [&str; 3] = ["Profile", "Notifications", "Security"];

#[component]
fn Settings() -> Element {
    let mut tab = use_signal(|| 0usize);
    let mut warranty_days = use_signal(|| "30, 7, 1".to_string());
    let mut return_days = use_signal(|| "7, 1".to_string());

    let save_preferences = move |_| {
        let parsed = (
            ui_utils::parse_reminder_days(&warranty_days.read()),
            ui_utils::parse_reminder_days(&return_days.read()),
        );
        match parsed {
            (Some(_), Some(_)) => show_toast("Preferences are not saved yet"),
            _ => show_toast("Reminder days must be comma-separated numbers"),
        }
    };

    rsx! {
        section { class: "panel",
            h2 { "Settings" }
            p { class: "muted", "Manage your account preferences and notification settings" }
            div { class: "tabs",
                for (i, label) in SETTINGS_TABS.iter().enumerate() {
                    button {
                        key: "{label}",
                        class: if *tab.read() == i { "tab active" } else { "tab" },
                        onclick: move |_| tab.set(i),
                        "{label}"
                    }
                }
            }
            {match *tab.read() {
                0 => rsx! {
                    div { class: "tab-panel stack narrow",
                        h3 { "Profile Information" }
                        label { "First Name" input { value: "John" } }
                        label { "Last Name" input { value: "Doe" } }
                        label { "Email" input { value: "john.doe@example.com", disabled: true } }
                        button { class: "btn btn-primary", "Save Changes" }
                    }
                },
                1 => rsx! {
                    div { class: "tab-panel stack",
                        h3 { "Notification Preferences" }
                        label { input { r#type: "checkbox", checked: true } "Email notifications for warranty expiration" }
                        label { input { r#type: "checkbox", checked: true } "Email notifications for return period expiration" }
                        label { input { r#type: "checkbox" } "Weekly summary emails" }
                        label { input { r#type: "checkbox", checked: true } "In-app notifications" }
                        hr {}
                        h4 { "Reminder Schedule" }
                        label { class: "narrow", "Warranty reminder days before expiration"
                            input { value: "{warranty_days}", oninput: move |e| warranty_days.set(e.value()) }
                            small { class: "muted", "Comma-separated values (e.g., 30, 7, 1)" }
                        }
                        label { class: "narrow", "Return period reminder days before expiration"
                            input { value: "{return_days}", oninput: move |e| return_days.set(e.value()) }
                            small { class: "muted", "Comma-separated values (e.g., 7, 1)" }
                        }
                        button { class: "btn btn-primary", onclick: save_preferences, "Save Preferences" }
                    }
                },
                _ => rsx! {
                    div { class: "tab-panel stack narrow",
                        h3 { "Security Settings" }
                        div { class: "alert alert-info", "Change your password to keep your account secure" }
                        label { "Current Password" input { r#type: "password" } }
                        label { "New Password" input { r#type: "password" } }
                        label { "Confirm New Password" input { r#type: "password" } }
                        button { class: "btn btn-primary", "Update Password" }
                        hr {}
                        h4 { "Account Actions" }
                        button { class: "btn btn-danger", "Delete Account" }
                    }
                },
            }}
        }
    }
}
