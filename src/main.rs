use std::process::ExitCode;

fn main() -> ExitCode {
    match csv_reconcile::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
