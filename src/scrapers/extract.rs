//! Field extraction from article pages.
//!
//! Source markup is heterogeneous and outside our control, so extraction is
//! best-effort: a field whose selectors match nothing is left empty and the
//! record is still produced.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::dates::DateParts;
use super::resolve::resolve;
use crate::config::CrawlConfig;

static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

static WESTERN_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)-([0-9]+)-([0-9]+)").unwrap());

static LOCALIZED_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)年([0-9]+)月([0-9]+)日").unwrap());

/// Raw fields pulled out of one article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub date: DateParts,
    pub body_html: String,
    pub attachments: Vec<String>,
}

/// Extract title, date, body and image attachments from `html`.
///
/// Image sources are resolved against `page_url`; images that cannot be
/// resolved are left out.
///
/// # Arguments
///
/// * `html` - The article page as fetched
/// * `config` - Source whose title, time and text selectors are applied
/// * `page_url` - URL the page was fetched from, used to resolve `img` sources
///
/// # Returns
///
/// An [`ExtractedArticle`]. Fields whose selectors match nothing are empty,
/// and the date is [`DateParts::UNKNOWN`] when no date text is found.
pub fn extract(html: &str, config: &CrawlConfig, page_url: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = config
        .title_selector
        .first_match(root)
        .map(|el| strip_whitespace(&element_text(el)))
        .unwrap_or_default();

    let date = config
        .time_selector
        .first_match(root)
        .map(|el| match_date_text(&element_text(el)))
        .unwrap_or_default();

    let body = config.text_selector.first_match(root);
    let body_html = body.map(|el| el.inner_html()).unwrap_or_default();
    let attachments = body
        .map(|el| collect_attachments(el, page_url))
        .unwrap_or_default();

    debug!(
        %page_url,
        has_title = !title.is_empty(),
        has_body = body.is_some(),
        attachments = attachments.len(),
        "Extracted article fields"
    );

    ExtractedArticle {
        title,
        date,
        body_html,
        attachments,
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Remove every whitespace character, not just the ends.
pub fn strip_whitespace(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{feff}')
        .collect()
}

/// Find a `Y-M-D` or `Y年M月D日` date in free text.
///
/// The western form is tried first. Returns [`DateParts::UNKNOWN`] when
/// neither matches.
pub fn match_date_text(text: &str) -> DateParts {
    [&*WESTERN_DATE_RE, &*LOCALIZED_DATE_RE]
        .into_iter()
        .find_map(|re| re.captures(text))
        .map(|caps| {
            let part = |idx: usize| caps[idx].parse::<u32>().unwrap_or(0);
            DateParts::new(part(1), part(2), part(3))
        })
        .unwrap_or(DateParts::UNKNOWN)
}

fn collect_attachments(body: ElementRef<'_>, page_url: &str) -> Vec<String> {
    body.select(&IMAGE_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve(page_url, src))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorSpecs;

    const PAGE: &str = "https://news.example.edu/info/1021/3456.htm";

    fn config(specs: SelectorSpecs) -> CrawlConfig {
        CrawlConfig::new("campus", "https://news.example.edu/list.htm", specs).unwrap()
    }

    const ARTICLE: &str = r#"
        <html><body>
          <h1 class="bt"> 学校召开
             2023年 工作会议 </h1>
          <span class="arti_update">发布时间：2023-05-05 浏览次数：12</span>
          <div class="read"><p>第一段</p><img src="/__local/a.png"><p><img src="../../img/b%20c.jpg"></p><img alt="no source"></div>
        </body></html>
    "#;

    #[test]
    fn test_extract_default_selectors() {
        let article = extract(ARTICLE, &config(SelectorSpecs::default()), PAGE);

        assert_eq!(article.title, "学校召开2023年工作会议");
        assert_eq!(article.date, DateParts::new(2023, 5, 5));
        assert!(article.body_html.starts_with("<p>第一段</p>"));
        assert_eq!(
            article.attachments,
            vec![
                "https://news.example.edu/__local/a.png".to_string(),
                "https://news.example.edu/img/b c.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_title_selector_fallback() {
        let specs = SelectorSpecs {
            title_selector: Some(vec![".missing", ".bt"].into()),
            ..Default::default()
        };
        let article = extract(ARTICLE, &config(specs), PAGE);
        assert_eq!(article.title, "学校召开2023年工作会议");
    }

    #[test]
    fn test_missing_elements_leave_fields_empty() {
        let article = extract(
            "<html><body><p>nothing here</p></body></html>",
            &config(SelectorSpecs::default()),
            PAGE,
        );
        assert_eq!(article, ExtractedArticle::default());
        assert_eq!(article.date, DateParts::UNKNOWN);
    }

    #[test]
    fn test_body_keeps_markup() {
        let html = r#"<div class="read"><p>a <b>bold</b> move</p><table><tr><td>x</td></tr></table></div>"#;
        let article = extract(html, &config(SelectorSpecs::default()), PAGE);
        assert_eq!(
            article.body_html,
            "<p>a <b>bold</b> move</p><table><tbody><tr><td>x</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_duplicate_images_are_kept() {
        let html = r#"<div class="read"><img src="a.png"><img src="a.png"></div>"#;
        let article = extract(html, &config(SelectorSpecs::default()), PAGE);
        assert_eq!(article.attachments.len(), 2);
        assert_eq!(article.attachments[0], article.attachments[1]);
    }

    #[test]
    fn test_unresolvable_images_are_skipped() {
        let html = r#"<div class="read"><img src="a.png"><img src=""><img src="%FF.png"><img src="/b.png"></div>"#;
        let article = extract(html, &config(SelectorSpecs::default()), PAGE);
        assert_eq!(
            article.attachments,
            vec![
                "https://news.example.edu/info/1021/a.png".to_string(),
                "https://news.example.edu/b.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_match_date_text() {
        assert_eq!(match_date_text("2021-3-1 10:00"), DateParts::new(2021, 3, 1));
        assert_eq!(match_date_text("发布于2022年11月9日"), DateParts::new(2022, 11, 9));
        assert_eq!(match_date_text("no date"), DateParts::UNKNOWN);
    }

    #[test]
    fn test_match_date_text_prefers_western() {
        assert_eq!(
            match_date_text("2020年1月2日 更新 2021-02-03"),
            DateParts::new(2021, 2, 3)
        );
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" a b\r\n\tc\u{3000}d "), "abcd");
    }
}
