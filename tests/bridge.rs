#[path = "bridge/support.rs"]
mod support;

#[path = "bridge/client_polling.rs"]
mod client_polling;
#[path = "bridge/relay_http.rs"]
mod relay_http;
