//! Deterministic in-memory web application used by the demo CLI and the
//! integration tests. One instance models one browser session's view of a
//! tiny item-management site.

const BASE_URL: &str = "https://demo.app";
const COOKIE_BANNER: &str = "We use cookies. [Accept]";

#[derive(Clone, Debug, PartialEq)]
enum Route {
    List,
    NewForm,
    Detail(usize),
    NotFound,
}

#[derive(Debug)]
pub struct SimWebApp {
    items: Vec<String>,
    draft: Option<String>,
    route: Route,
    banner_dismissed: bool,
    flash: Option<String>,
}

impl SimWebApp {
    pub fn new() -> Self {
        Self {
            items: vec!["alpha".to_string(), "beta".to_string()],
            draft: None,
            route: Route::List,
            banner_dismissed: false,
            flash: None,
        }
    }

    pub fn url(&self) -> String {
        match &self.route {
            Route::List => format!("{BASE_URL}/items"),
            Route::NewForm => format!("{BASE_URL}/items/new"),
            Route::Detail(id) => format!("{BASE_URL}/items/{id}"),
            Route::NotFound => format!("{BASE_URL}/404"),
        }
    }

    pub fn title(&self) -> String {
        match &self.route {
            Route::List => "Items".to_string(),
            Route::NewForm => "New Item".to_string(),
            Route::Detail(id) => match self.items.get(*id) {
                Some(name) => format!("Item {name}"),
                None => "Item".to_string(),
            },
            Route::NotFound => "Not Found".to_string(),
        }
    }

    /// Rendered page text, the simulated "vision" input.
    pub fn body(&self) -> String {
        let mut body = String::new();
        if !self.banner_dismissed {
            body.push_str(COOKIE_BANNER);
            body.push('\n');
        }
        if let Some(flash) = &self.flash {
            body.push_str(flash);
            body.push('\n');
        }
        match &self.route {
            Route::List => {
                body.push_str("Items\n");
                for name in &self.items {
                    body.push_str(&format!("- {name}\n"));
                }
                body.push_str("[New item]");
            }
            Route::NewForm => {
                body.push_str("New item form\nName: ");
                if let Some(draft) = &self.draft {
                    body.push_str(draft);
                }
                body.push_str("\n[Save] [Cancel]");
            }
            Route::Detail(id) => match self.items.get(*id) {
                Some(name) => {
                    body.push_str(&format!("Item '{name}'\n[Edit] [Delete] [Back]"));
                }
                None => body.push_str("missing item"),
            },
            Route::NotFound => body.push_str("404 not found"),
        }
        body
    }

    pub fn open(&mut self, url: &str) {
        self.flash = None;
        let path = url
            .strip_prefix(BASE_URL)
            .unwrap_or(url)
            .trim_end_matches('/');
        self.route = match path {
            "" | "/items" => Route::List,
            "/items/new" => Route::NewForm,
            other => match other
                .strip_prefix("/items/")
                .and_then(|id| id.parse::<usize>().ok())
            {
                Some(id) if id < self.items.len() => Route::Detail(id),
                _ => Route::NotFound,
            },
        };
    }

    /// Resolve a click by label. Unknown labels are a target miss, not an
    /// application error.
    pub fn click(&mut self, label: &str) -> bool {
        let label = label.to_lowercase();
        if label == "accept" {
            return self.dismiss_banner();
        }
        match (self.route.clone(), label.as_str()) {
            (Route::List, "new item") => {
                self.flash = None;
                self.draft = None;
                self.route = Route::NewForm;
                true
            }
            (Route::NewForm, "save") => {
                match self.draft.take() {
                    Some(name) => {
                        self.items.push(name.clone());
                        let id = self.items.len() - 1;
                        self.flash = Some(format!("Item '{name}' created successfully"));
                        self.route = Route::Detail(id);
                    }
                    // Saving an empty form re-renders it unchanged.
                    None => {}
                }
                true
            }
            (Route::NewForm, "cancel") => {
                self.draft = None;
                self.route = Route::List;
                true
            }
            (Route::Detail(id), "delete") => {
                let name = self.items.remove(id);
                self.flash = Some(format!("Item '{name}' removed successfully"));
                self.route = Route::List;
                true
            }
            (Route::Detail(_), "back") => {
                self.flash = None;
                self.route = Route::List;
                true
            }
            (Route::List, other) => {
                if let Some(id) = self
                    .items
                    .iter()
                    .position(|name| name.to_lowercase() == other)
                {
                    self.flash = None;
                    self.route = Route::Detail(id);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn type_text(&mut self, label: &str, text: &str) -> bool {
        if self.route == Route::NewForm && label.eq_ignore_ascii_case("name") {
            self.draft = Some(text.to_string());
            true
        } else {
            false
        }
    }

    pub fn dismiss_banner(&mut self) -> bool {
        if self.banner_dismissed {
            false
        } else {
            self.banner_dismissed = true;
            true
        }
    }
}

impl Default for SimWebApp {
    fn default() -> Self {
        Self::new()
    }
}
