use terrapanel_console::ElementId;
use terrapanel_server::assets::{HEADER_PLACEHOLDER, StaticAssets};

const INDEX: &str = include_str!("../../../static/index.html");

#[test]
fn shipped_page_has_every_widget_element() {
    for id in ElementId::ALL {
        let needle = format!("id=\"{}\"", id.as_str());
        assert!(INDEX.contains(&needle), "index.html is missing {needle}");
    }
}

#[test]
fn shipped_page_renders_header() {
    let static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../static");
    let assets = StaticAssets::new(static_dir, "Texas Server");
    let response = assets.respond("/").expect("index");
    let page = String::from_utf8(response.body).expect("utf8");
    assert!(!page.contains(HEADER_PLACEHOLDER));
    assert!(page.contains("<h1>Texas Server</h1>"));
}
