use minijinja::{Environment, context};
use serde::Serialize;
use shared::{Language, SavedImage};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

#[derive(Serialize)]
struct LanguageOption {
    code: &'static str,
    name: &'static str,
}

/// Server-rendered upload form and gallery.
pub struct GalleryPage {
    env: Environment<'static>,
}

impl GalleryPage {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render(&self, saved_images: &[SavedImage]) -> Result<String, minijinja::Error> {
        let languages: Vec<LanguageOption> = Language::all()
            .into_iter()
            .map(|language| LanguageOption {
                code: language.code(),
                name: language.display_name(),
            })
            .collect();

        self.env.get_template("index.html")?.render(context! {
            saved_images => saved_images,
            languages => languages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_language_selector_and_empty_gallery() {
        let page = GalleryPage::new().unwrap();
        let html = page.render(&[]).unwrap();

        assert!(html.contains(r#"<option value="hi">Hindi</option>"#));
        assert!(html.contains(r#"<option value="kn">Kannada</option>"#));
        assert!(html.contains("No saved images yet."));
        assert!(!html.contains("data-filename="));
    }

    #[test]
    fn renders_saved_images_escaped() {
        let page = GalleryPage::new().unwrap();
        let images = vec![SavedImage {
            filename: "stop_20240309_140507.png".into(),
            path: "/static/uploads/stop_20240309_140507.png".into(),
            upload_time: "2024-03-09 14:05:07".into(),
        }, SavedImage {
            filename: "<script>.png".into(),
            path: "/static/uploads/x.png".into(),
            upload_time: "2024-03-09 14:05:07".into(),
        }];

        let html = page.render(&images).unwrap();

        assert!(html.contains(r#"data-filename="stop_20240309_140507.png""#));
        assert!(html.contains("2024-03-09 14:05:07"));
        assert!(html.contains("&lt;script&gt;.png"));
        assert!(!html.contains("No saved images yet."));
    }
}
