// Command line interface module
// Handles parsing of command line arguments into the browser configuration

use crate::app::Mode;
use clap::Parser;
use std::path::PathBuf;

/// imgcmp - Compare images from several folders side by side
#[derive(Parser, Debug)]
#[command(name = "imgcmp")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Folders to compare (one display column per folder)
    #[arg(value_name = "FOLDER", required = true, num_args = 1..)]
    pub folders: Vec<PathBuf>,

    /// Image file extension to collect from each folder
    #[arg(short, long, default_value = "png", value_parser = parse_extension)]
    pub extension: String,

    /// Only browse: disable marking and never move anything to the trash
    #[arg(long, default_value = "false")]
    pub view_only: bool,

    /// Log the marked files instead of moving them to the trash
    #[arg(long, default_value = "false", conflicts_with = "view_only")]
    pub dry_run: bool,
}

/// Parsed arguments with the browsing mode resolved
#[derive(Debug)]
pub struct ParsedArgs {
    pub folders: Vec<PathBuf>,
    pub extension: String,
    pub mode: Mode,
    pub dry_run: bool,
}

/// Normalize an extension: strip one leading dot and lowercase it
fn parse_extension(s: &str) -> Result<String, String> {
    let ext = s.strip_prefix('.').unwrap_or(s).to_lowercase();
    if ext.is_empty() {
        return Err("Extension must not be empty".to_string());
    }
    if ext.contains(['.', '/', '\\']) {
        return Err(format!("Invalid extension: {s}"));
    }
    Ok(ext)
}

impl From<Args> for ParsedArgs {
    fn from(args: Args) -> Self {
        let mode = if args.view_only {
            Mode::ViewOnly
        } else {
            Mode::Mark
        };

        ParsedArgs {
            folders: args.folders,
            extension: args.extension,
            mode,
            dry_run: args.dry_run,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> ParsedArgs {
    ParsedArgs::from(Args::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<ParsedArgs, clap::Error> {
        Args::try_parse_from(argv).map(ParsedArgs::from)
    }

    #[test]
    fn folders_are_required() {
        let err = parse(&["imgcmp"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn defaults_to_png_and_marking() {
        let args = parse(&["imgcmp", "a", "b"]).unwrap();
        assert_eq!(args.folders, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(args.extension, "png");
        assert_eq!(args.mode, Mode::Mark);
        assert!(!args.dry_run);
    }

    #[test]
    fn extension_is_normalized() {
        let args = parse(&["imgcmp", "-e", ".JPG", "a"]).unwrap();
        assert_eq!(args.extension, "jpg");
    }

    #[test]
    fn rejects_bad_extensions() {
        assert!(Args::try_parse_from(["imgcmp", "--extension", ".", "a"]).is_err());
        assert!(Args::try_parse_from(["imgcmp", "--extension", "tar.gz", "a"]).is_err());
    }

    #[test]
    fn view_only_switches_mode() {
        let args = parse(&["imgcmp", "--view-only", "a"]).unwrap();
        assert_eq!(args.mode, Mode::ViewOnly);
    }

    #[test]
    fn dry_run_conflicts_with_view_only() {
        assert!(Args::try_parse_from(["imgcmp", "--view-only", "--dry-run", "a"]).is_err());
    }
}
