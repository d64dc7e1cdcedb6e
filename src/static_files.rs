use std::fs::File;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use plainhttp::{HttpError, Response, Status};

/// Characters escaped in the links of a directory listing.
const LINK: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>').add(b'?');


/// Streams `file`, typed by its extension.
pub fn serve_file(file: &Path) -> Result<Response, HttpError> {
    let content_type = mime_guess::from_path(file).first_or_octet_stream();
    log::trace!("Serving {} as {}", file.to_string_lossy(), content_type);

    Ok(Response::builder(Status::Ok)
        .content_type(content_type.essence_str())
        .send_file(File::open(file)?)?
        .build())
}

/// An HTML index of the directory `dir`, reached through `path`.
pub fn list_directory(path: &str, dir: &Path) -> Result<Response, HttpError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        entries.push((is_dir, name));
    }
    // Directories first, then by name.
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let base = if path.is_empty() { String::from("/") } else { format!("/{}/", path) };
    let title = html_escape::encode_text(&base);

    let mut html = format!("<html><head><title>Index of {0}</title></head><body>\n<h1>Index of {0}</h1>\n<ul>\n", title);
    if !path.is_empty() {
        let parent = match path.rfind('/') {
            Some(end) => format!("/{}/", &path[..end]),
            None => String::from("/"),
        };
        html.push_str(&format!("<li><a href=\"{}\">../</a></li>\n", utf8_percent_encode(&parent, LINK)));
    }
    for (is_dir, name) in entries.iter() {
        let suffix = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{}{}\">{}{}</a></li>\n",
            utf8_percent_encode(&base, LINK),
            utf8_percent_encode(name, LINK),
            suffix,
            html_escape::encode_text(name),
            suffix,
        ));
    }
    html.push_str("</ul>\n</body></html>\n");

    Ok(Response::builder(Status::Ok)
        .content_type("text/html")
        .body_from_string(&html)
        .build())
}
