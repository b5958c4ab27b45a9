use owo_colors::{OwoColorize, Stream::Stdout};

pub fn heading(text: &str) -> String {
    text.if_supports_color(Stdout, |t| t.bold()).to_string()
}

pub fn success(text: &str) -> String {
    text.if_supports_color(Stdout, |t| t.green()).to_string()
}

pub fn info(text: &str) -> String {
    text.if_supports_color(Stdout, |t| t.dimmed()).to_string()
}

pub fn warn(text: &str) -> String {
    text.if_supports_color(Stdout, |t| t.yellow()).to_string()
}

pub fn error(text: &str) -> String {
    text.if_supports_color(Stdout, |t| t.red()).to_string()
}

/// Element kinds get a fixed color each so nested listings stay scannable.
pub fn kind(text: &str) -> String {
    match text {
        "function" => text.if_supports_color(Stdout, |t| t.cyan()).to_string(),
        "class" | "interface" => text.if_supports_color(Stdout, |t| t.magenta()).to_string(),
        "variable" => info(text),
        _ => text.if_supports_color(Stdout, |t| t.blue()).to_string(),
    }
}
