pub mod health_check;
pub mod home;
pub mod subscribe;
pub mod verify;

pub use health_check::*;
pub use home::*;
pub use subscribe::*;
pub use verify::*;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
