mod app;

fn main() {
    log::set_logger(app::logging::AppLogger::init()).expect("failed to set logger");

    let status = match app::run() {
        Ok(()) => 0,
        Err(app::Error::Usage(message)) => {
            log::error!("{}", message);
            2
        }
        Err(app::Error::Fatal(err)) => {
            log::error!("{:?}", err);
            1
        }
    };
    log::logger().flush();

    if status != 0 {
        std::process::exit(status);
    }
}
