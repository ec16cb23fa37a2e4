//! Text extraction from the grading site's HTML pages.
//!
//! The pages are small and stable, so a handful of regular expressions does
//! the job of a DOM parser.

use lazy_static::lazy_static;
use regex::Regex;

use crate::grader::{CompilerMessage, Problem};

/// `id` of the problem selector on the list page.
pub const PROBLEM_SELECT_ID: &str = "submission_problem_id";

/// Marker the site prints after a rejected login.
pub const WRONG_PASSWORD_MARKER: &str = "Wrong password";

lazy_static! {
    static ref FORM_RE: Regex = Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").unwrap();
    static ref INPUT_RE: Regex = Regex::new(r"(?is)<input\b([^>]*)>").unwrap();
    static ref SELECT_RE: Regex = Regex::new(r"(?is)<select\b([^>]*)>(.*?)</select>").unwrap();
    static ref OPTION_RE: Regex = Regex::new(r"(?is)<option\b([^>]*)>(.*?)</option>").unwrap();
    static ref TABLE_RE: Regex = Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table>").unwrap();
    static ref TR_RE: Regex = Regex::new(r"(?is)<tr\b([^>]*)>(.*?)</tr>").unwrap();
    static ref TD_RE: Regex = Regex::new(r"(?is)<td\b([^>]*)>(.*?)</td>").unwrap();
    static ref A_RE: Regex = Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap();
    static ref H2_RE: Regex = Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>").unwrap();
    static ref BODY_RE: Regex = Regex::new(r"(?is)<body\b[^>]*>(.*)</body>").unwrap();
    static ref LINE_BREAK_RE: Regex = Regex::new(r"(?i)<br\s*/?>|</?p\b[^>]*>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.\[\]]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#
    )
    .unwrap();
    static ref MULTI_SPACE_RE: Regex = Regex::new(r"\s{2,}").unwrap();
    static ref AFTER_PIPE_RE: Regex = Regex::new(r"\s*\|.*").unwrap();
}

/// An HTML form reduced to what a scripted submit needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub action: String,
    /// Hidden inputs (CSRF tokens and the like) to send back unchanged
    pub hidden: Vec<(String, String)>,
}

/// Value of attribute `name` in a tag's attribute text.
pub fn attr(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()))
    })
}

fn has_class(attrs: &str, class: &str) -> bool {
    attr(attrs, "class")
        .map(|value| value.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Visible text of a fragment with whitespace runs collapsed.
pub fn text_of(fragment: &str) -> String {
    let text = decode_entities(&TAG_RE.replace_all(fragment, " "));
    MULTI_SPACE_RE
        .replace_all(text.trim(), " ")
        .replace('\n', " ")
}

/// Text shown in a result cell, without the `| ...` trailer the site appends.
fn cell_text(fragment: &str) -> String {
    let without_links = A_RE.replace_all(fragment, " ");
    AFTER_PIPE_RE
        .replace(&text_of(&without_links), "")
        .trim()
        .to_string()
}

pub fn first_form(html: &str) -> Option<Form> {
    let caps = FORM_RE.captures(html)?;
    let action = attr(&caps[1], "action").unwrap_or_default();
    let hidden = INPUT_RE
        .captures_iter(&caps[2])
        .filter(|input| {
            attr(&input[1], "type")
                .map(|t| t.eq_ignore_ascii_case("hidden"))
                .unwrap_or(false)
        })
        .filter_map(|input| {
            let name = attr(&input[1], "name")?;
            Some((name, attr(&input[1], "value").unwrap_or_default()))
        })
        .collect();
    Some(Form { action, hidden })
}

/// `(id, name)` of every selectable problem. Negative ids are placeholders.
pub fn problem_options(html: &str) -> Vec<(i64, String)> {
    SELECT_RE
        .captures_iter(html)
        .find(|caps| attr(&caps[1], "id").as_deref() == Some(PROBLEM_SELECT_ID))
        .map(|select| {
            OPTION_RE
                .captures_iter(&select[2])
                .filter_map(|opt| {
                    let id: i64 = attr(&opt[1], "value")?.trim().parse().ok()?;
                    (id >= 0).then(|| (id, text_of(&opt[2])))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Problems listed on the main page: selector options joined with the rows
/// of every `info` table. A row belongs to the first option whose name it
/// contains; a later row for the same id replaces the earlier one in place.
pub fn problems(html: &str) -> Vec<Problem> {
    let options = problem_options(html);
    let mut problems: Vec<Problem> = Vec::new();

    let rows = TABLE_RE
        .captures_iter(html)
        .filter(|table| has_class(&table[1], "info"))
        .flat_map(|table| {
            TR_RE
                .captures_iter(&table[2])
                .filter(|tr| !has_class(&tr[1], "info-head"))
                .map(|tr| tr[2].to_string())
                .collect::<Vec<_>>()
        });

    for row in rows {
        let cells: Vec<String> = TD_RE
            .captures_iter(&row)
            .map(|td| td[2].to_string())
            .collect();
        let Some(name_cell) = cells.get(1) else {
            continue;
        };

        let name = cell_text(name_cell);
        let description = A_RE
            .captures(name_cell)
            .and_then(|a| attr(&a[1], "href"));
        let (status, compiler_msg) = match cells.get(3) {
            Some(status_cell) => (
                cell_text(status_cell),
                A_RE
                    .captures_iter(status_cell)
                    .find(|a| text_of(&a[2]) == "[compiler msg]")
                    .and_then(|a| attr(&a[1], "href")),
            ),
            None => (String::new(), None),
        };

        let Some((id, _)) = options
            .iter()
            .find(|(_, option_name)| name.contains(option_name.as_str()))
        else {
            continue;
        };

        let problem = Problem {
            id: *id,
            name,
            description,
            status,
            compiler_msg,
        };
        match problems.iter_mut().find(|p| p.id == problem.id) {
            Some(existing) => *existing = problem,
            None => problems.push(problem),
        }
    }

    problems
}

pub fn compiler_message(html: &str) -> CompilerMessage {
    let body = BODY_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| html.to_string());
    let title = H2_RE
        .captures(&body)
        .map(|caps| text_of(&caps[1]))
        .unwrap_or_default();
    let rest = H2_RE.replace(&body, "");
    let lines = LINE_BREAK_RE
        .split(&rest)
        .map(|line| decode_entities(TAG_RE.replace_all(line, "").trim()))
        .filter(|line| !line.is_empty())
        .collect();
    CompilerMessage { title, lines }
}

pub fn is_wrong_password(html: &str) -> bool {
    html.contains(WRONG_PASSWORD_MARKER)
}
