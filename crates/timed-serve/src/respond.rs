use std::fmt::Write as _;

use crate::{Error, ErrorKind};

const NOT_FOUND_BODY: &str = "<h1> <center> 404: Page not found </center> </h1>";
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

pub(crate) fn static_file_handler(
    root: &std::path::Path,
    req: tiny_http::Request,
) -> Result<(), Error> {
    let method = req.method().clone();
    let url = req.url().to_owned();

    if !matches!(method, tiny_http::Method::Get | tiny_http::Method::Head) {
        log::debug!("{method} {url} 501");
        let response = tiny_http::Response::from_string(format!("Unsupported method ({method})"))
            .with_status_code(501);
        return req.respond(response).map_err(respond_error);
    }

    let raw_path = strip_query(&url);
    let req_path = percent_decode(raw_path);
    let path = resolve(root, &req_path);

    let status = if path.is_dir() {
        if !req_path.ends_with('/') {
            let location = format!("{raw_path}/{}", &url[raw_path.len()..]);
            let response =
                tiny_http::Response::empty(301).with_header(header("Location", &location)?);
            req.respond(response).map_err(respond_error)?;
            301
        } else if let Some(index) = INDEX_FILES
            .iter()
            .map(|name| path.join(name))
            .find(|index| index.is_file())
        {
            serve_file(req, &index)?
        } else {
            let listing = list_directory(&path, &req_path)?;
            let response = tiny_http::Response::from_data(listing.into_bytes())
                .with_header(header("Content-Type", "text/html; charset=utf-8")?);
            req.respond(response).map_err(respond_error)?;
            200
        }
    } else if path.is_file() {
        serve_file(req, &path)?
    } else {
        let response = tiny_http::Response::from_data(NOT_FOUND_BODY.as_bytes())
            .with_status_code(404)
            .with_header(header("Content-Type", "text/html")?);
        req.respond(response).map_err(respond_error)?;
        404
    };
    log::debug!("{method} {url} {status}");

    Ok(())
}

fn serve_file(req: tiny_http::Request, path: &std::path::Path) -> Result<u16, Error> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::new(ErrorKind::Respond, format!("failed to open {}", path.display())).with_source(e)
    })?;
    let mut response = tiny_http::Response::from_file(file);
    if let Some(mime) = mime_guess::MimeGuess::from_path(path).first_raw() {
        response.add_header(header("Content-Type", mime)?);
    }
    req.respond(response).map_err(respond_error)?;
    Ok(200)
}

fn list_directory(dir: &std::path::Path, req_path: &str) -> Result<String, Error> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::new(ErrorKind::Respond, format!("failed to list {}", dir.display())).with_source(e)
    })?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            name
        })
        .collect();
    names.sort_by_key(|name| name.to_lowercase());

    let title = format!("Directory listing for {}", escape_html(req_path));
    let mut body = String::new();
    let _ = writeln!(body, "<!DOCTYPE HTML>");
    let _ = writeln!(body, "<html>");
    let _ = writeln!(body, "<head>");
    let _ = writeln!(body, "<meta charset=\"utf-8\">");
    let _ = writeln!(body, "<title>{title}</title>");
    let _ = writeln!(body, "</head>");
    let _ = writeln!(body, "<body>");
    let _ = writeln!(body, "<h1>{title}</h1>");
    let _ = writeln!(body, "<hr>");
    let _ = writeln!(body, "<ul>");
    for name in &names {
        let _ = writeln!(
            body,
            "<li><a href=\"{}\">{}</a></li>",
            encode_href(name),
            escape_html(name)
        );
    }
    let _ = writeln!(body, "</ul>");
    let _ = writeln!(body, "<hr>");
    let _ = writeln!(body, "</body>");
    let _ = writeln!(body, "</html>");
    Ok(body)
}

fn header(field: &str, value: &str) -> Result<tiny_http::Header, Error> {
    tiny_http::Header::from_bytes(field.as_bytes(), value.as_bytes()).map_err(|()| {
        Error::new(
            ErrorKind::Respond,
            format!("invalid header `{field}: {value}`"),
        )
    })
}

fn respond_error(e: std::io::Error) -> Error {
    Error::new(ErrorKind::Respond, "failed to send response").with_source(e)
}

/// Path portion of a request target
///
/// Querystrings are often used for cachebusting, so they (and fragments) are dropped before
/// looking at the filesystem.
fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Map a request path onto `root`, ignoring segments that could walk out of it
fn resolve(root: &std::path::Path, req_path: &str) -> std::path::PathBuf {
    let mut path = root.to_path_buf();
    for segment in req_path.split(['/', '\\']) {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(':') {
            continue;
        }
        path.push(segment);
    }
    path
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = hex {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn encode_href(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char);
            }
            _ => {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
