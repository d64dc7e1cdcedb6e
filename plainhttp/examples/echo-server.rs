use std::io::{self, BufRead};

use plainhttp::{
    server::Listener,
    HttpError, Request, Response, Status,
};

fn echo(req: Request) -> Result<Response, HttpError> {
    let mut result = String::new();
    result.push_str(&format!("method: {}\n", req.method().as_str()));
    result.push_str(&format!("path: /{}\n", req.path()));

    for (name, value) in req.query().iter() {
        result.push_str(&format!("arg: {}={}\n", name, value));
    }
    for (name, value) in req.headers().iter() {
        result.push_str(&format!("header: {}: {}\n", name, value));
    }
    for (name, value) in req.form().iter() {
        result.push_str(&format!("form: {}={}\n", name, value));
    }
    if let Some(body) = req.body() {
        result.push_str(&format!("body: {}\n", base64::encode_config(body, base64::URL_SAFE)));
    }

    Ok(Response::builder(Status::Ok)
        .content_type("text/plain; charset=utf-8")
        .body_from_string(&result)
        .build())
}

fn plain_error(error: HttpError) -> Response {
    log::warn!("{}", error);
    Response::builder(error.status())
        .body_from_string(error.public_message().unwrap_or(""))
        .build()
}

fn main() {
    pretty_env_logger::init_timed();
    let listener = Listener::new(echo, plain_error);
    listener.start(8508).unwrap();
    println!("Listening on port 8508, press enter to stop");

    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    listener.stop();
}
