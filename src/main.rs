// imgcmp - Compare images from several folders side by side
// Browse matching images with the arrow keys, mark rejects with the column
// number and move them to the trash when the window closes

mod app;
mod catalog;
mod cli;
mod finalize;
mod image_loader;
mod render;
mod wayland;

use anyhow::Result;
use app::{Mode, Session};
use finalize::{DryRun, SystemTrash};
use log::info;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args();

    info!(
        "Starting imgcmp with folders: {:?}, extension: {}, mode: {:?}",
        args.folders, args.extension, args.mode
    );

    // Collect the image lists
    let images = catalog::scan(&args.folders, &args.extension)?;

    info!(
        "Comparing {} images across {} folders",
        images.len(),
        images.folders().len()
    );

    let session = Session::new(images.len(), images.columns(), args.mode);
    let session = wayland::run(images.clone(), session)?;

    if session.mode() == Mode::ViewOnly {
        return Ok(());
    }

    let marked = session.marks().count();
    if marked == 0 {
        info!("No images marked");
        return Ok(());
    }

    info!("Moving {} marked images to the trash", marked);
    let report = if args.dry_run {
        finalize::delete_marked_images(&images, session.marks(), &DryRun)?
    } else {
        finalize::delete_marked_images(&images, session.marks(), &SystemTrash)?
    };
    info!("Done: {} files handled", report.trashed.len());

    Ok(())
}
