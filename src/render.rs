use serde_json::Value;
use tera::{Context, Tera};

/// Turns a template name and a JSON context into markup.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> tera::Result<String>;
}

macro_rules! embedded {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../templates/", $name)))),*]
    };
}

const TEMPLATES: &[(&str, &str)] = embedded![
    "base.html",
    "posts/includes/feed.html",
    "posts/includes/paginator.html",
    "posts/index.html",
    "posts/group_list.html",
    "posts/profile.html",
    "posts/post_detail.html",
    "posts/create_post.html",
    "posts/follow.html",
    "users/signup.html",
    "users/login.html",
    "users/logged_out.html",
    "about/author.html",
    "about/tech.html",
    "core/404.html",
    "core/403.html",
    "core/500.html",
];

/// Tera over the templates compiled into the binary.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> tera::Result<Templates> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Templates { tera })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tera.get_template_names()
    }
}

impl Renderer for Templates {
    fn render(&self, template: &str, context: &Value) -> tera::Result<String> {
        let context = Context::from_serialize(context)?;
        self.tera.render(template, &context)
    }
}
