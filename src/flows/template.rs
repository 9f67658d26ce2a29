//! Login email template with `{{link}}` and `{{expiry_minutes}}` placeholders.

// self
use crate::_prelude::*;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.5;">
	<h2>Login to Feedback App</h2>
	<p>Use the button below to sign in. The link expires in {{expiry_minutes}} minutes and works only once.</p>
	<p><a href="{{link}}" style="padding: 10px 16px; background: #2563eb; color: #fff; text-decoration: none; border-radius: 4px;">Sign in</a></p>
	<p>If the button does not work, paste this address into your browser:<br>{{link}}</p>
	<p>If you did not ask to sign in, you can ignore this email.</p>
</body>
</html>
"#;

/// Errors raised while parsing a login template.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TemplateError {
	/// A `{{` was never closed.
	#[error("Template has an unclosed placeholder at byte {offset}.")]
	Unclosed {
		/// Byte offset of the opening braces.
		offset: usize,
	},
	/// A placeholder name is not recognized.
	#[error("Template placeholder `{name}` is not supported.")]
	UnknownPlaceholder {
		/// Placeholder name as written.
		name: String,
	},
	/// The template never references the login link.
	#[error("Template must contain a {{{{link}}}} placeholder.")]
	MissingLink,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Text(String),
	Link,
	ExpiryMinutes,
}

/// Parsed login email template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginTemplate {
	segments: Vec<Segment>,
}
impl LoginTemplate {
	/// Parses `source`, accepting `{{link}}` and `{{expiry_minutes}}` (whitespace inside the
	/// braces is ignored).
	pub fn parse(source: &str) -> Result<Self, TemplateError> {
		let mut segments = Vec::new();
		let mut rest = source;
		let mut offset = 0;

		while let Some(start) = rest.find("{{") {
			if start > 0 {
				segments.push(Segment::Text(rest[..start].to_owned()));
			}

			let after_open = &rest[start + 2..];
			let end = after_open
				.find("}}")
				.ok_or(TemplateError::Unclosed { offset: offset + start })?;
			let name = after_open[..end].trim();

			segments.push(match name {
				"link" => Segment::Link,
				"expiry_minutes" => Segment::ExpiryMinutes,
				other => return Err(TemplateError::UnknownPlaceholder { name: other.to_owned() }),
			});

			let consumed = start + 2 + end + 2;

			offset += consumed;
			rest = &rest[consumed..];
		}

		if !rest.is_empty() {
			segments.push(Segment::Text(rest.to_owned()));
		}
		if !segments.contains(&Segment::Link) {
			return Err(TemplateError::MissingLink);
		}

		Ok(Self { segments })
	}

	/// Renders the template; substituted values are HTML-escaped.
	pub fn render(&self, link: &Url, expiry_minutes: i64) -> String {
		let link = escape_html(link.as_str());
		let minutes = expiry_minutes.to_string();
		let mut out = String::new();

		for segment in &self.segments {
			match segment {
				Segment::Text(text) => out.push_str(text),
				Segment::Link => out.push_str(&link),
				Segment::ExpiryMinutes => out.push_str(&minutes),
			}
		}

		out
	}
}
impl Default for LoginTemplate {
	fn default() -> Self {
		Self::parse(DEFAULT_TEMPLATE).unwrap_or_else(|_| Self { segments: vec![Segment::Link] })
	}
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(ch),
		}
	}

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_template_parses_and_renders() {
		let link = Url::parse("https://feedback.test/auth/verify?token=abc&x=1")
			.expect("Link fixture should parse.");
		let html = LoginTemplate::default().render(&link, 15);

		assert!(html.contains("https://feedback.test/auth/verify?token=abc&amp;x=1"));
		assert!(html.contains("expires in 15 minutes"));
		assert!(!html.contains("{{"));
	}

	#[test]
	fn parse_accepts_spaced_placeholders() {
		let template = LoginTemplate::parse("<a href=\"{{ link }}\">{{expiry_minutes}}m</a>")
			.expect("Spaced placeholders should parse.");
		let link = Url::parse("https://a.test/").expect("Link fixture should parse.");

		assert_eq!(template.render(&link, 5), "<a href=\"https://a.test/\">5m</a>");
	}

	#[test]
	fn parse_rejects_bad_templates() {
		assert_eq!(
			LoginTemplate::parse("hello {{link").unwrap_err(),
			TemplateError::Unclosed { offset: 6 }
		);
		assert_eq!(
			LoginTemplate::parse("{{link}} {{name}}").unwrap_err(),
			TemplateError::UnknownPlaceholder { name: "name".into() }
		);
		assert_eq!(LoginTemplate::parse("no link here").unwrap_err(), TemplateError::MissingLink);
	}

	#[test]
	fn escape_html_covers_markup_characters() {
		assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
	}
}
