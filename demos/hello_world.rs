use std::collections::HashMap;

use saucer::backends::headless::{HeadlessWebview, HeadlessWindow};
use saucer::webview::events::{DomReady, Navigate, Title};
use saucer::window::events::Closed;
use saucer::{
    AppOptions, Application, EmbeddedFile, Launch, Policy, Preferences, Size, Webview, WebviewError, Window,
};

const INDEX: &str = r#"<!doctype html>
<html>
  <body>
    <h1>Hello from saucer</h1>
    <script>
      window.saucer.exposed.add(1, 2).then((sum) => document.title = `1 + 2 = ${sum}`);
    </script>
  </body>
</html>"#;

fn main() -> Result<(), WebviewError> {
    env_logger::init();

    // The thread that creates the application becomes the UI thread. Everything that touches a
    // window or webview ends up running here.
    let options = AppOptions::builder()
        .id("org.saucer.hello-world")
        .threads(2)
        .build()
        .expect("options are not valid");
    let app = Application::new(options)?;

    // The headless backends keep everything in memory. A real application would plug in a
    // platform backend here instead.
    let (window_backend, window_handle) = HeadlessWindow::new();
    let window = Window::new(&app, Box::new(window_backend))?;
    window.set_title("Hello World")?;
    window.set_size(Size::new(800, 600))?;
    window.show()?;

    let quitter = app.clone();
    window.on::<Closed>(move |_| quitter.quit());

    let (webview_backend, page) = HeadlessWebview::new();
    let webview = Webview::new(&window, Box::new(webview_backend), Preferences::default())?;

    // Anything outside of the embedded origin is refused
    webview.on::<Navigate>(|navigation| {
        if navigation.url.starts_with("saucer://") {
            Policy::Allow
        } else {
            println!("refusing to navigate to {}", navigation.url);
            Policy::Block
        }
    });
    webview.on::<DomReady>(|_| println!("DOM is ready"));
    webview.on::<Title>(|title| println!("title is now {title:?}"));

    // Make `add` callable from the page and serve the page from memory
    webview.expose("add", |a: i64, b: i64| Ok::<_, String>(a + b), Launch::Sync);
    webview.embed(
        HashMap::from([("index.html".to_string(), EmbeddedFile::new(INDEX, "text/html"))]),
        Launch::Sync,
    )?;
    webview.serve("index.html")?;
    webview.set_url("https://example.org/")?;
    app.run_pending();
    println!("now showing {}", webview.url());

    // The page fetches its own document through the scheme handler...
    if let Some(response) = page.request("saucer://embedded/index.html").and_then(|p| p.take()) {
        match response {
            Ok(response) => println!("served {} bytes of {}", response.data.len(), response.mime),
            Err(e) => println!("request failed: {e}"),
        }
    }

    // ...calls the exposed function, and changes its title with the answer
    page.post_message(r#"{"saucer:call":true,"name":"add","params":[1,2],"id":1}"#);
    app.run_pending();
    if let Some(reply) = page.executed().last() {
        println!("page received: {reply}");
    }
    page.set_title("1 + 2 = 3");
    app.run_pending();

    // Evaluate an expression in the page. The headless page does not run scripts, so answer for it.
    let sum = webview.evaluate::<i64>("{} + {}", (20, 22));
    page.post_message(r#"{"saucer:resolve":true,"id":1,"result":42}"#);
    app.run_pending();
    match futures::executor::block_on(sum) {
        Ok(sum) => println!("page says 20 + 22 = {sum}"),
        Err(e) => println!("evaluation failed: {e}"),
    }

    // Closing the window quits the loop
    window_handle.request_close();
    app.run();

    Ok(())
}
