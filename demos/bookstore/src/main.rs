//! Bookstore Demo
//!
//! Runs a handful of requests through a dispatcher and prints what each one
//! rendered. The same handlers serve HTML and JSON; the view is picked by the
//! `Accept` header or, with `--favor-format`, by a `format` parameter.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package bookstore
//! cargo run --package bookstore -- --config demos/bookstore/sluice.toml --favor-format
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use sluice::prelude::*;
use sluice::runtime::config::load_config_from_file;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(about = "Dispatch sample requests through a bookstore controller")]
struct Args {
    /// Configuration file; defaults to sluice.toml in the working directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Honour the `format` request parameter.
    #[arg(long)]
    favor_format: bool,
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct Book {
    id: u64,
    title: String,
}

#[derive(Debug, Clone, Default)]
struct Basket {
    ids: Vec<u64>,
}

struct Bookstore {
    books: Vec<Book>,
}

impl Bookstore {
    fn new() -> Self {
        let books = ["Dune", "Emma", "Ulysses"]
            .into_iter()
            .zip(1..)
            .map(|(title, id)| Book {
                id,
                title: title.to_string(),
            })
            .collect();
        Self { books }
    }

    fn basket(&self) -> Attribute<Basket> {
        Attribute(Basket::default())
    }

    fn list(&self) -> ModelAndView {
        ModelAndView::with_view_name("books/list")
            .attribute("books", AttrValue::collection(self.books.clone()))
    }

    fn show(&self, id: PathVariable<u64>) -> Result<ModelAndView> {
        let book = self
            .books
            .iter()
            .find(|b| b.id == *id)
            .ok_or_else(|| anyhow::anyhow!("no book with id {}", *id))?;
        Ok(ModelAndView::with_view_name("books/show").attribute("book", AttrValue::object(book.clone())))
    }

    fn add(&self, basket: ModelAttribute<Basket>, id: PathVariable<u64>, model: ModelMap) -> String {
        let mut basket = basket.into_inner();
        basket.ids.push(*id);
        model.add_attribute("basket", AttrValue::object(basket));
        "redirect:/basket".to_string()
    }

    fn basket_size(&self, basket: SessionAttribute<Basket>) -> ResponseBody<usize> {
        ResponseBody(basket.ids.len())
    }

    fn order(&self, basket: SessionAttribute<Basket>, status: SessionStatus) -> Callable {
        let count = basket.ids.len();
        status.set_complete();
        Callable::new(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ModelAndView::with_view_name("orders/placed").attribute("count", count)
        })
        .described("place order")
    }
}

// ============================================================================
// Views
// ============================================================================

fn json_view<F>(render: F) -> BoxedView
where
    F: Fn(&ModelMap) -> serde_json::Value + Send + Sync + 'static,
{
    FnView::new(MediaType::application_json(), move |model, _| {
        Ok(serde_json::to_string(&render(model))?)
    })
    .boxed()
}

fn html_view<F>(render: F) -> BoxedView
where
    F: Fn(&ModelMap) -> String + Send + Sync + 'static,
{
    FnView::new(MediaType::text_html(), move |model, _| Ok(render(model))).boxed()
}

fn books(model: &ModelMap) -> Vec<Book> {
    model.get_as::<Vec<Book>>("books").unwrap_or_default()
}

fn build(config: &SluiceConfig) -> Result<Dispatcher> {
    let dispatcher = DispatcherBuilder::from_config(config)?
        .view(
            "books/list",
            html_view(|model| {
                let items: String = books(model)
                    .iter()
                    .map(|b| format!("<li>{}</li>", b.title))
                    .collect();
                format!("<ul>{items}</ul>")
            }),
        )
        .view("books/list.json", json_view(|model| serde_json::json!(books(model))))
        .view(
            "books/show",
            html_view(|model| match model.get_as::<Book>("book") {
                Some(book) => format!("<h1>{}</h1>", book.title),
                None => String::new(),
            }),
        )
        .view(
            "books/show.json",
            json_view(|model| serde_json::json!(model.get_as::<Book>("book"))),
        )
        .view(
            "orders/placed",
            html_view(|model| format!("<p>{} book(s) ordered</p>", model.get_as::<usize>("count").unwrap_or(0))),
        )
        .build();

    let store = Bookstore::new();
    dispatcher.register_controller(
        Controller::new(Arc::new(store))
            .session_attributes(SessionAttributes::new().name("basket"))
            .model_method("basket", Bookstore::basket)
            .route("/books", "list", Bookstore::list)
            .route("/books/{id}", "show", Bookstore::show)
            .route("/basket/add/{id}", "add", Bookstore::add)
            .route("/basket", "basketSize", Bookstore::basket_size)
            .route("/orders", "order", Bookstore::order),
    )?;
    Ok(dispatcher)
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Rendered { view, .. } => match view.header("Location") {
            Some(location) => format!("-> {location}"),
            None => view.body.clone(),
        },
        DispatchOutcome::Body { value, .. } => format!("{value:?}"),
        DispatchOutcome::Handled { .. } => "(handled)".to_string(),
        DispatchOutcome::NotFound => "(not found)".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_from_file(path)?,
        None => ConfigLoader::new().with_current_dir().load()?,
    };
    config.negotiation.favor_parameter |= args.favor_format;
    init_logging(&config.logging);

    let dispatcher = build(&config)?;
    let session = Session::new();

    let requests = [
        WebRequest::builder("/books").accept("text/html"),
        WebRequest::builder("/books").accept("application/json"),
        WebRequest::builder("/books").param("format", "json"),
        WebRequest::builder("/books/2").accept("application/json"),
        WebRequest::builder("/books/9").accept("text/html"),
        WebRequest::builder("/basket/add/1"),
        WebRequest::builder("/basket/add/3"),
        WebRequest::builder("/basket"),
        WebRequest::builder("/orders").accept("text/html"),
        WebRequest::builder("/authors"),
    ];

    for builder in requests {
        let request = Arc::new(builder.session(session.clone()).build());
        let path = request.path().to_string();
        match dispatcher.dispatch(request).await {
            Ok(outcome) => info!(%path, status = outcome.status(), "{}", describe(&outcome)),
            Err(e) => error!(%path, error = %e, "Request failed"),
        }
    }

    Ok(())
}
