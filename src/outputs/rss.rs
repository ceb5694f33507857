//! RSS 2.0 rendering and persistence for a [`CountryFeed`].
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── venezuela.xml
//! ├── panama.xml
//! └── dominicana.xml
//! ```
//!
//! Each file is rewritten in full on every run. The document goes to a
//! temporary sibling first and is renamed into place, so readers never see a
//! half-written feed.

use crate::config::{ChannelConfig, PipelineConfig, PlaceholderConfig};
use crate::models::CountryFeed;
use crate::utils::upcase;
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// RFC 822 date as RSS readers expect it, always in GMT.
fn rss_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Drop control characters XML 1.0 does not allow.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c as u32 >= 0x20)
        .collect()
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&sanitize_text(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: Write>(
    w: &mut Writer<W>,
    title: &str,
    link: &str,
    published: &DateTime<Utc>,
    category: &str,
) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(w, "title", title)?;
    write_text_element(w, "link", link)?;
    write_text_element(w, "pubDate", &rss_date(published))?;
    write_text_element(w, "category", category)?;
    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Renders and persists country feeds with the run's channel metadata.
#[derive(Debug)]
pub struct FeedWriter<'a> {
    output_dir: PathBuf,
    channel: &'a ChannelConfig,
    placeholders: &'a PlaceholderConfig,
}

impl<'a> FeedWriter<'a> {
    pub fn new(config: &'a PipelineConfig, output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            channel: &config.channel,
            placeholders: &config.placeholders,
        }
    }

    /// Path of the file for `country`.
    pub fn path_for(&self, country: &str) -> PathBuf {
        self.output_dir.join(format!("{country}.xml"))
    }

    /// Render `feed` as an RSS 2.0 document.
    ///
    /// When placeholder padding is enabled, a feed shorter than `limit` gets
    /// "no more headlines" entries appended; the feed itself is not changed.
    pub fn render(&self, feed: &CountryFeed, limit: usize) -> Result<String, Box<dyn Error>> {
        let display = upcase(&feed.country);
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;
        write_text_element(
            &mut writer,
            "title",
            &format!("{} {}", self.channel.title_prefix, display),
        )?;
        write_text_element(&mut writer, "link", &self.channel.link)?;
        write_text_element(&mut writer, "description", &self.channel.description)?;
        write_text_element(&mut writer, "lastBuildDate", &rss_date(&feed.built_at))?;
        write_text_element(&mut writer, "generator", &self.channel.generator)?;

        for item in &feed.items {
            write_item(&mut writer, &item.title, &item.link, &item.published_at, &item.domain)?;
        }

        if self.placeholders.enabled {
            let title = self.placeholders.title.replace("{country}", &display);
            for _ in feed.items.len()..limit {
                write_item(&mut writer, &title, &self.placeholders.link, &feed.built_at, "generator")?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let mut out = String::from_utf8(writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }

    /// Render and write `feed`, replacing any previous file for the country.
    #[instrument(level = "info", skip_all, fields(country = %feed.country))]
    pub async fn write(&self, feed: &CountryFeed, limit: usize) -> Result<PathBuf, Box<dyn Error>> {
        let document = self.render(feed, limit)?;

        if let Err(e) = fs::create_dir_all(&self.output_dir).await {
            error!(dir = %self.output_dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }

        let path = self.path_for(&feed.country);
        let tmp = self.output_dir.join(format!(".{}.xml.tmp", feed.country));
        fs::write(&tmp, document).await?;
        fs::rename(&tmp, &path).await?;

        info!(path = %path.display(), items = feed.items.len(), "Wrote feed");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewsItem;
    use chrono::TimeZone;

    fn feed() -> CountryFeed {
        let at = Utc.with_ymd_and_hms(2025, 5, 6, 10, 15, 0).unwrap();
        CountryFeed {
            country: "dominicana".to_string(),
            items: vec![
                NewsItem {
                    title: "Precios <suben> & bajan".to_string(),
                    link: "https://listindiario.com/economia/precios?id=1&page=2".to_string(),
                    domain: "listindiario.com".to_string(),
                    published_at: at,
                },
                NewsItem {
                    title: "Lluvias en el Cibao\u{0007}".to_string(),
                    link: "https://diariolibre.com/lluvias".to_string(),
                    domain: "diariolibre.com".to_string(),
                    published_at: at,
                },
            ],
            built_at: at,
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("headline_feeds_{tag}_{}", std::process::id()))
    }

    #[test]
    fn test_render_document() {
        let config = PipelineConfig::default();
        let writer = FeedWriter::new(&config, Path::new("unused"));
        let xml = writer.render(&feed(), 10).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains("<title>Noticias Dominicana</title>"));
        assert!(xml.contains("<lastBuildDate>Tue, 06 May 2025 10:15:00 GMT</lastBuildDate>"));
        assert!(xml.contains("<title>Precios &lt;suben&gt; &amp; bajan</title>"));
        assert!(xml.contains("<link>https://listindiario.com/economia/precios?id=1&amp;page=2</link>"));
        assert!(xml.contains("<category>diariolibre.com</category>"));
        assert!(xml.contains("<title>Lluvias en el Cibao</title>"));
        assert_eq!(xml.matches("<item>").count(), 2);
    }

    #[test]
    fn test_render_empty_feed_is_valid() {
        let config = PipelineConfig::default();
        let writer = FeedWriter::new(&config, Path::new("unused"));
        let xml = writer.render(&CountryFeed::empty("panama"), 10).unwrap();
        assert!(xml.contains("<title>Noticias Panama</title>"));
        assert_eq!(xml.matches("<item>").count(), 0);
        assert!(xml.trim_end().ends_with("</rss>"));
    }

    #[test]
    fn test_placeholders_pad_only_when_enabled() {
        let mut config = PipelineConfig::default();
        config.placeholders.enabled = true;
        let writer = FeedWriter::new(&config, Path::new("unused"));
        let xml = writer.render(&feed(), 5).unwrap();
        assert_eq!(xml.matches("<item>").count(), 5);
        assert_eq!(
            xml.matches("No se encontraron más titulares recientes para Dominicana").count(),
            3
        );

        let xml = writer.render(&feed(), 1).unwrap();
        assert_eq!(xml.matches("<item>").count(), 2);
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_file() {
        let dir = temp_dir("write");
        let config = PipelineConfig::default();
        let writer = FeedWriter::new(&config, &dir);

        let path = writer.write(&feed(), 10).await.unwrap();
        assert_eq!(path, dir.join("dominicana.xml"));
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first.matches("<item>").count(), 2);

        writer.write(&CountryFeed::empty("dominicana"), 10).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(second.matches("<item>").count(), 0);
        assert!(!dir.join(".dominicana.xml.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
