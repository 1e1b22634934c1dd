//! Mounts the groups from a library config, loads them, and reports what
//! was loaded
//!
//! Usage: `horizon_resources [config.ron]`

use std::env;

use horizon_resources::prelude::*;

/// Number of engine ticks to simulate between load and unload
const TICKS: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => LibraryConfig::load_ron(path)?,
        None => LibraryConfig::default().with_mount("ui", "./ui.zip"),
    };

    let mut library = Library::from_config(&config);
    for mount in &config.mounts {
        if let Some(group) = library.group_mut(&mount.group) {
            group.register_loader(TextureLoader::new())?;
            log::info!(
                "Group '{}': {} script(s)",
                group.name(),
                group.scripts().len()
            );
        }
    }

    library.load_all_groups();
    for _ in 0..TICKS {
        library.update();
    }

    for name in library.group_names() {
        if let Some(group) = library.group(name) {
            let decoded = group
                .loader::<TextureLoader>()
                .map_or(0, |loader| loader.borrow().backend().decoded_count());
            log::info!(
                "{name}: {} ({decoded} image(s) decoded)",
                group.resource_state()
            );
        }
    }
    let default = library.get::<Texture>("ui", "default");
    log::info!("ui/default valid: {}", default.valid());

    library.unload_all_groups();
    log::info!("After unload: {}", library.resource_state());
    Ok(())
}
