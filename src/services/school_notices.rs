// src/services/school_notices.rs

//! University notice listing crawler.
//!
//! The listing renders each notice as a `<dl>` inside
//! `ul.board-thumb-wrap`: the `<dt>` holds a table whose third cell is the
//! title, the `<dd>` holds a `<ul>` of labelled fields
//! (`No.`, author, `작성일`, `조회수`).

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{NoticeConfig, SchoolNotice};
use crate::utils::normalize_whitespace;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid number regex"));
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid date regex"));

/// Where the university notice listing comes from.
#[async_trait]
pub trait SchoolNoticeSource: Send + Sync {
    async fn fetch_listing(&self) -> Result<ListingOutcome>;
}

/// Service for crawling the university notice listing.
pub struct SchoolNoticeCrawler {
    client: Client,
    config: NoticeConfig,
}

impl SchoolNoticeCrawler {
    pub fn new(client: Client, config: &NoticeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Fetch and parse the listing page.
    pub async fn fetch_all(&self) -> Result<ListingOutcome> {
        let limit = self.config.article_limit.to_string();
        let html = self
            .client
            .get(&self.config.school_url)
            .query(&[
                ("srUpperNoticeYn", "on"),
                ("srCampus", self.config.campus.as_str()),
                ("article.offset", "0"),
                ("articleLimit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_listing(&html)
    }
}

#[async_trait]
impl SchoolNoticeSource for SchoolNoticeCrawler {
    async fn fetch_listing(&self) -> Result<ListingOutcome> {
        self.fetch_all().await
    }
}

/// Parsed listing plus the number of rows that could not be read.
#[derive(Debug, Default)]
pub struct ListingOutcome {
    pub notices: Vec<SchoolNotice>,
    pub skipped: usize,
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Parse the notice listing HTML.
pub fn parse_listing(html: &str) -> Result<ListingOutcome> {
    let document = Html::parse_document(html);
    let board_sel = parse_selector("ul.board-thumb-wrap")?;
    let row_sel = parse_selector("dl")?;
    let title_sel = parse_selector("dt table td")?;
    let field_sel = parse_selector("dd ul li")?;

    let board = document
        .select(&board_sel)
        .next()
        .ok_or_else(|| AppError::parse("school notice", "ul.board-thumb-wrap not found"))?;

    let mut outcome = ListingOutcome::default();
    for (index, row) in board.select(&row_sel).enumerate() {
        match parse_row(&row, &title_sel, &field_sel) {
            Ok(notice) => outcome.notices.push(notice),
            Err(e) => {
                outcome.skipped += 1;
                log::warn!("Skipping school notice row #{}: {}", index, e);
            }
        }
    }
    Ok(outcome)
}

fn parse_row(row: &ElementRef, title_sel: &Selector, field_sel: &Selector) -> Result<SchoolNotice> {
    let title = row
        .select(title_sel)
        .nth(2)
        .map(|td| normalize_whitespace(&td.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::parse("school notice", "missing title cell"))?;

    let fields: Vec<String> = row
        .select(field_sel)
        .map(|li| normalize_whitespace(&li.text().collect::<String>()))
        .collect();

    let field = |i: usize, name: &str| {
        fields
            .get(i)
            .map(String::as_str)
            .ok_or_else(|| AppError::parse("school notice", format!("missing {name} field")))
    };

    Ok(SchoolNotice {
        post_id: parse_number(field(0, "No.")?, "post id")?,
        created_time: parse_date(field(2, "작성일")?)?,
        views: parse_number(field(3, "조회수")?, "views")?,
        title,
    })
}

fn parse_number(text: &str, name: &str) -> Result<u64> {
    NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .ok_or_else(|| AppError::parse("school notice", format!("bad {name}: {text:?}")))
}

/// `작성일 2023-04-02` → `2023.04.02_00:00:00`
fn parse_date(text: &str) -> Result<String> {
    let caps = DATE_RE
        .captures(text)
        .ok_or_else(|| AppError::parse("school notice", format!("bad date: {text:?}")))?;
    let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
    let pad = |s: &str| format!("{:0>2}", s);
    Ok(format!("{}.{}.{}_00:00:00", part(1), pad(part(2)), pad(part(3))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str, no: &str, date: &str, views: &str) -> String {
        format!(
            r#"<dl>
                <dt><table><tbody><tr>
                    <td>공지</td><td>학생처</td><td>
                        {title}
                    </td>
                </tr></tbody></table></dt>
                <dd><ul>
                    <li>No.{no}</li>
                    <li>작성자 학생처</li>
                    <li>작성일	{date}</li>
                    <li>조회수 {views}</li>
                </ul></dd>
            </dl>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r#"<html><body><ul class="board-thumb-wrap">{}</ul></body></html>"#,
            rows.join("\n")
        )
    }

    #[test]
    fn test_parse_listing() {
        let html = page(&[
            row("2026학년도 2학기 수강신청 안내", "1024", "2026-08-01", "1,532"),
            row("도서관 휴관 안내", "1023", "2026-7-30", "88"),
        ]);

        let outcome = parse_listing(&html).unwrap();
        assert_eq!(outcome.skipped, 0);
        assert_eq!(
            outcome.notices[0],
            SchoolNotice {
                title: "2026학년도 2학기 수강신청 안내".to_string(),
                post_id: 1024,
                created_time: "2026.08.01_00:00:00".to_string(),
                views: 1532,
            }
        );
        assert_eq!(outcome.notices[1].created_time, "2026.07.30_00:00:00");
    }

    #[test]
    fn test_bad_row_is_skipped() {
        let html = page(&[
            row("정상 공지", "7", "2026-08-01", "3"),
            row("조회수 없음", "8", "2026-08-01", "-"),
        ]);

        let outcome = parse_listing(&html).unwrap();
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_missing_board_is_error() {
        let err = parse_listing("<html><body><p>점검 중</p></body></html>").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
