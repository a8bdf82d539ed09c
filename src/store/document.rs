use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    ZipCodes,
    ZipCodesChecked,
    PermitNumber,
    DateOfBirth,
    EarliestDate,
    EarliestZipCode,
}

impl Label {
    pub const ALL: [Label; 6] = [
        Label::ZipCodes,
        Label::ZipCodesChecked,
        Label::PermitNumber,
        Label::DateOfBirth,
        Label::EarliestDate,
        Label::EarliestZipCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::ZipCodes => "Zip Codes",
            Label::ZipCodesChecked => "Zip Codes Checked",
            Label::PermitNumber => "Permit Number",
            Label::DateOfBirth => "Date of Birth",
            Label::EarliestDate => "Found Earliest Availability Date",
            Label::EarliestZipCode => "Found Earliest Availability Zip Code",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct LabelledLine<'a> {
    label: Label,
    prefix: &'a str,
    value: &'a str,
}

fn bullet_prefix_len(line: &str) -> usize {
    let indent = line.len() - line.trim_start().len();
    let rest = &line[indent..];
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some('-' | '*' | '+'), Some(c)) if c.is_whitespace() => {
            let after_marker = &rest[1..];
            indent + 1 + (after_marker.len() - after_marker.trim_start().len())
        }
        _ => indent,
    }
}

// The label must be followed by a colon, so `Zip Codes:` never claims a `Zip Codes Checked:` line.
fn classify(line: &str) -> Option<LabelledLine<'_>> {
    let prefix_len = bullet_prefix_len(line);
    let body = &line[prefix_len..];

    Label::ALL.iter().find_map(|&label| {
        let after_label = body.strip_prefix(label.as_str())?;
        let value = after_label.trim_start_matches([' ', '\t']).strip_prefix(':')?;
        Some(LabelledLine {
            label,
            prefix: &line[..prefix_len],
            value: value.trim(),
        })
    })
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items.join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    newline: &'static str,
    trailing_newline: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            newline: "\n",
            trailing_newline: true,
        }
    }
}

impl Document {
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            lines: text.lines().map(str::to_string).collect(),
            newline: if text.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: text.ends_with('\n'),
        }
    }

    /// Value of the first line carrying `label`, trimmed. `None` when the label is absent.
    pub fn field(&self, label: Label) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(|line| classify(line))
            .find(|l| l.label == label)
            .map(|l| l.value)
    }

    pub fn list(&self, label: Label) -> Vec<String> {
        self.field(label).map(split_list).unwrap_or_default()
    }

    /// Rewrite the first line carrying `label`, keeping its prefix. Appends a
    /// new line when the label is missing.
    pub fn set_field(&mut self, label: Label, value: &str) {
        let value = value.replace(['\r', '\n'], " ");
        let value = value.trim();
        let render = |prefix: &str| {
            if value.is_empty() {
                format!("{}{}:", prefix, label)
            } else {
                format!("{}{}: {}", prefix, label, value)
            }
        };

        let existing = self.lines.iter().enumerate().find_map(|(idx, line)| {
            classify(line)
                .filter(|l| l.label == label)
                .map(|l| (idx, l.prefix.to_string()))
        });

        match existing {
            Some((idx, prefix)) => self.lines[idx] = render(&prefix),
            None => {
                let prefix = self
                    .lines
                    .iter()
                    .find_map(|line| classify(line).map(|l| l.prefix.trim_start().to_string()))
                    .unwrap_or_default();
                self.lines.push(render(&prefix));
            }
        }
    }

    pub fn set_list(&mut self, label: Label, items: &[String]) {
        self.set_field(label, &join_list(items));
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.newline);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(self.newline);
        }
        out
    }
}
