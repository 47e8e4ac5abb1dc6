use console::{style, Color, Term};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::WerksConfig;
use crate::store::LoadedWerk;
use crate::werk::WerkClass;

/// Width of all list columns before the title
const LIST_PREFIX_WIDTH: usize = 45;

pub const SEPARATOR: &str =
    "-------------------------------------------------------------------------------";

const GREP_COLORS: [Color; 5] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
];

pub const WERK_NOTES: &str = r"
    .---Werk----------------------------------------------------------------------.
    |                                                                             |
    |             The Werk is intended for the user/admin!!                       |
    |                                                                             |
    |    It should be obvious from the title if a user/admin is affected.         |
    |    Describe what needs to be done in the details. You can also note if no   |
    |    user interaction is required. If necessary, add technical details.       |
    |                                                                             |
    '-----------------------------------------------------------------------------'

";

pub fn werk_id(id: u32) -> String {
    style(id).blue().on_white().to_string()
}

fn colored_class(class: WerkClass, width: usize) -> String {
    let padded = format!("{:<width$}", class.to_string(), width = width);
    match class {
        WerkClass::Fix => style(padded).red().bold().to_string(),
        _ => padded,
    }
}

/// Room for the title on the current terminal, unlimited when not a terminal
fn title_width() -> Option<usize> {
    Term::stdout()
        .size_checked()
        .map(|(_, cols)| usize::from(cols).saturating_sub(LIST_PREFIX_WIDTH))
}

fn truncate(text: &str, width: Option<usize>) -> &str {
    match width {
        Some(width) => match text.char_indices().nth(width) {
            Some((end, _)) => &text[..end],
            None => text,
        },
        None => text,
    }
}

/// One line of `werk list`
pub fn list_line(loaded: &LoadedWerk, title: &str, modified: bool) -> String {
    let werk = &loaded.werk;
    let title = truncate(title, title_width());
    let title = if modified {
        style(format!("(*) {}", title)).bold().cyan().to_string()
    } else {
        title.to_string()
    };
    format!(
        "{} {:9} {} {:3} {:13} {:6} {} {:8} {}",
        werk_id(werk.id),
        werk.date.date_naive().to_string(),
        colored_class(werk.class, 8),
        werk.edition,
        werk.component,
        werk.compatible.to_string(),
        style(werk.level).bold(),
        werk.version,
        title
    )
}

/// Highlight the first case-insensitive occurrence of `keyword` in `line`.
///
/// `n` selects the highlight color, so that several keywords differ.
pub fn grep_highlight(line: &str, keyword: &str, n: usize) -> Option<String> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(keyword))).ok()?;
    let found = pattern.find(line)?;
    let color = GREP_COLORS[n % GREP_COLORS.len()];
    Some(format!(
        "{}{}{}",
        &line[..found.start()],
        style(found.as_str()).fg(color),
        &line[found.end()..]
    ))
}

/// `werk export`: one block per component with a running number, the
/// summed effort and one line per werk plus its description.
pub fn csv_export<'a>(
    config: &WerksConfig,
    werks: impl IntoIterator<Item = &'a LoadedWerk> + Clone,
) -> String {
    fn line(parts: &[&str]) -> String {
        format!("\"{}\"\n", parts.join("\";\""))
    }

    let mut out = String::new();
    for (nr, (component, alias)) in config.components.iter().enumerate() {
        let component_werks: Vec<&LoadedWerk> = werks
            .clone()
            .into_iter()
            .filter(|loaded| &loaded.werk.component == component)
            .collect();
        let total_effort: u32 = component_werks.iter().map(|loaded| effort(loaded)).sum();

        out.push_str(&line(&["", "", "", "", ""]));
        out.push_str(&line(&[
            "",
            &format!("{}. {}", nr + 1, alias),
            "",
            &total_effort.to_string(),
        ]));
        for loaded in component_werks {
            let class = config.class_name(loaded.stored.content.get("class").unwrap_or_default());
            out.push_str(&line(&[
                &loaded.werk.id.to_string(),
                &loaded.werk.title,
                class,
                &effort(loaded).to_string(),
            ]));
            let description = loaded.werk.description.replace('\n', " ").replace('"', "'");
            out.push_str(&line(&["", &description, "", ""]));
        }
    }
    out
}

fn effort(loaded: &LoadedWerk) -> u32 {
    loaded
        .stored
        .content
        .get("effort")
        .and_then(|effort| effort.parse().ok())
        .unwrap_or(0)
}

/// Minimal HTML page showing a werk the way the changelog renders it
pub fn html_preview(loaded: &LoadedWerk) -> String {
    let werk = &loaded.werk;
    let definitions: Vec<String> = werk
        .metadata_fields()
        .into_iter()
        .map(|(name, value)| format!("<dt>{}<dt><dd>{}</dd>", name, value))
        .collect();
    format!(
        "<!DOCTYPE html><html lang=\"en\" style=\"font-family:sans-serif;\">\
         <head><title>Preview of Werk {id}</title></head>\
         <body style=\"background-color:#ccc; max-width:1600px; padding: 10px; margin:auto;\">\
         <h1>{title}</h1>\
         <div style=\"background-color:#fff; padding: 10px;\">{description}</div>\
         <dl>{definitions}</dl>\
         </body></html>\n",
        id = werk.id,
        title = werk.title,
        description = werk.description,
        definitions = definitions.join("\n"),
    )
}

static ANSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"));

/// Remove terminal escapes, for logging and tests
pub fn strip_ansi(text: &str) -> String {
    ANSI.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_werk;
    use crate::store::StoredWerk;
    use crate::werk::load_werk;
    use std::path::PathBuf;

    fn loaded(id: u32, component: &str, effort: &str, description: &str) -> LoadedWerk {
        let text = format!(
            "[//]: # (werk v2)\n# Werk {id}\n\nkey | value\n--- | ---\n\
             date | 2024-03-01T10:00:00+00:00\nversion | 2.3.0p3\nclass | fix\n\
             edition | cre\ncomponent | {component}\nlevel | 2\ncompatible | yes\n\
             effort | {effort}\n\n{description}\n"
        );
        let content = parse_werk(&text, &format!("{}.md", id)).unwrap();
        let werk = load_werk(&content, None).unwrap();
        LoadedWerk {
            stored: StoredWerk {
                id,
                path: PathBuf::from(format!("{}.md", id)),
                content,
            },
            werk,
        }
    }

    #[test]
    fn test_list_line_columns() {
        let werk = loaded(15001, "checks", "1", "d");
        let line = strip_ansi(&list_line(&werk, "Werk 15001", false));
        assert_eq!(
            line,
            "15001 2024-03-01 fix      cre checks        yes    2 2.3.0p3  Werk 15001"
        );

        let line = strip_ansi(&list_line(&werk, "Werk 15001", true));
        assert!(line.ends_with("2.3.0p3  (*) Werk 15001"));
    }

    #[test]
    fn test_grep_highlight() {
        let highlighted = grep_highlight("Backup of VM failed", "vm", 0).unwrap();
        assert_eq!(strip_ansi(&highlighted), "Backup of VM failed");
        assert!(grep_highlight("Backup of VM failed", "snapshot", 0).is_none());
        assert!(grep_highlight("costs (in $)", "$)", 1).is_some());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Übersicht", Some(3)), "Übe");
        assert_eq!(truncate("short", Some(10)), "short");
        assert_eq!(truncate("short", None), "short");
    }

    #[test]
    fn test_csv_export() {
        let root = crate::config::tests::werks_dir_with_config(crate::config::tests::CONFIG_TOML);
        let config = WerksConfig::load(&root.path().join(".werks")).unwrap();
        let werks = vec![
            loaded(15001, "checks", "2", "First line\nsays \"hi\""),
            loaded(15002, "checks", "3", "Second"),
            loaded(15003, "core", "x", "Third"),
        ];

        let csv = export_lines(csv_export(&config, &werks));
        assert_eq!(
            csv,
            vec![
                r#""";"";"";"";"""#,
                r#""";"1. Checks & agents";"";"5""#,
                r#""15001";"Werk 15001";"Bug fix";"2""#,
                r#""";"First line says 'hi'";"";"""#,
                r#""15002";"Werk 15002";"Bug fix";"3""#,
                r#""";"Second";"";"""#,
                r#""";"";"";"";"""#,
                r#""";"2. User interface";"";"0""#,
                r#""";"";"";"";"""#,
                r#""";"3. Core & setup";"";"0""#,
                r#""15003";"Werk 15003";"Bug fix";"0""#,
                r#""";"Third";"";"""#,
            ]
        );
    }

    fn export_lines(csv: String) -> Vec<String> {
        csv.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_html_preview() {
        let html = html_preview(&loaded(15001, "checks", "1", "Body"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Preview of Werk 15001</title>"));
        assert!(html.contains("<h1>Werk 15001</h1>"));
        assert!(html.contains("<dt>component<dt><dd>checks</dd>"));
    }
}
