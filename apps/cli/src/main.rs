mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use app_settings::AppSettings;
use catalog::db::{Album, Medium};
use catalog::import::{ImportOptions, ImportProgress, ImportStage};
use catalog::services::{AlbumUpdate, PasswordChange};
use catalog::Catalog;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, warn};

const CATALOG_ARG: &str = "catalog";
const THUMBNAILS_ARG: &str = "thumbnails";
const OVERWRITE_ARG: &str = "overwrite";
const DIR_ARG: &str = "dir";
const WORKERS_ARG: &str = "workers";
const ALBUM_ARG: &str = "album";
const COLLECTION_ARG: &str = "collection";
const MEDIUM_ARG: &str = "medium";
const ID_ARG: &str = "id";
const NAME_ARG: &str = "name";
const PASSWORD_ARG: &str = "password";
const SAVE_ARG: &str = "save";

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .value_parser(value_parser!(i64))
}

fn name_arg() -> Arg {
    Arg::new(NAME_ARG).help("Display name").required(true)
}

fn password_option() -> Arg {
    Arg::new(PASSWORD_ARG)
        .long(PASSWORD_ARG)
        .help("Plaintext password; only its digest is stored")
        .num_args(1)
        .required(false)
}

fn build_command() -> Command {
    Command::new("medieval")
        .about("Catalogs image and video files with thumbnails, albums, and collections")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(CATALOG_ARG)
                .long(CATALOG_ARG)
                .help("Catalog database file (overrides the saved setting)")
                .num_args(1)
                .global(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(THUMBNAILS_ARG)
                .long(THUMBNAILS_ARG)
                .help("Thumbnail directory (overrides the saved setting)")
                .num_args(1)
                .global(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("init")
                .about("Creates the catalog tables")
                .arg(
                    Arg::new(OVERWRITE_ARG)
                        .long(OVERWRITE_ARG)
                        .help("Drop every existing table first")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Imports the image and video files directly inside a directory")
                .arg(
                    Arg::new(DIR_ARG)
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new(WORKERS_ARG)
                        .long(WORKERS_ARG)
                        .help("Worker threads for extraction and thumbnailing")
                        .num_args(1)
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("media")
                .about("Lists media in timeline order")
                .arg(
                    Arg::new(ALBUM_ARG)
                        .long(ALBUM_ARG)
                        .help("Only media linked to this album")
                        .num_args(1)
                        .value_parser(value_parser!(i64)),
                )
                .arg(password_option()),
        )
        .subcommand(Command::new("albums").about("Lists albums"))
        .subcommand(Command::new("collections").about("Lists collections"))
        .subcommand(
            Command::new("album")
                .about("Album operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Creates an album")
                        .arg(name_arg())
                        .arg(password_option()),
                )
                .subcommand(
                    Command::new("rename")
                        .about("Renames an album")
                        .arg(id_arg(ID_ARG, "Album id"))
                        .arg(name_arg()),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Deletes an album and its links")
                        .arg(id_arg(ID_ARG, "Album id")),
                )
                .subcommand(
                    Command::new("add")
                        .about("Links a medium to an album")
                        .arg(id_arg(ALBUM_ARG, "Album id"))
                        .arg(id_arg(MEDIUM_ARG, "Medium id")),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Unlinks a medium from an album")
                        .arg(id_arg(ALBUM_ARG, "Album id"))
                        .arg(id_arg(MEDIUM_ARG, "Medium id")),
                )
                .subcommand(
                    Command::new("lock")
                        .about("Sets an album password")
                        .arg(id_arg(ID_ARG, "Album id"))
                        .arg(Arg::new(PASSWORD_ARG).required(true)),
                )
                .subcommand(
                    Command::new("unlock")
                        .about("Clears an album password")
                        .arg(id_arg(ID_ARG, "Album id")),
                )
                .subcommand(
                    Command::new("check")
                        .about("Checks a password against an album")
                        .arg(id_arg(ID_ARG, "Album id"))
                        .arg(Arg::new(PASSWORD_ARG).required(true)),
                ),
        )
        .subcommand(
            Command::new("collection")
                .about("Collection operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Creates a collection")
                        .arg(name_arg())
                        .arg(password_option()),
                )
                .subcommand(
                    Command::new("rename")
                        .about("Renames a collection")
                        .arg(id_arg(ID_ARG, "Collection id"))
                        .arg(name_arg()),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Deletes a collection and its album links")
                        .arg(id_arg(ID_ARG, "Collection id")),
                )
                .subcommand(
                    Command::new("add")
                        .about("Links an album to a collection")
                        .arg(id_arg(COLLECTION_ARG, "Collection id"))
                        .arg(id_arg(ALBUM_ARG, "Album id")),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Unlinks an album from a collection")
                        .arg(id_arg(COLLECTION_ARG, "Collection id"))
                        .arg(id_arg(ALBUM_ARG, "Album id")),
                )
                .subcommand(
                    Command::new("albums")
                        .about("Lists the albums in a collection")
                        .arg(id_arg(ID_ARG, "Collection id")),
                ),
        )
        .subcommand(
            Command::new("medium")
                .about("Medium operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("remove")
                        .about("Removes a medium and its album links")
                        .arg(id_arg(ID_ARG, "Medium id")),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Prints the effective settings")
                .arg(
                    Arg::new(SAVE_ARG)
                        .long(SAVE_ARG)
                        .help("Persist the effective settings, including overrides")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn load_saved_settings() -> AppSettings {
    AppSettings::load().unwrap_or_else(|err| {
        warn!("failed to load settings, using defaults: {err}");
        AppSettings::default()
    })
}

fn apply_overrides(settings: &mut AppSettings, matches: &ArgMatches) {
    if let Some(path) = matches.get_one::<PathBuf>(CATALOG_ARG) {
        settings.set_catalog_path(path.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>(THUMBNAILS_ARG) {
        settings.set_thumbnail_dir(path.clone());
    }
}

fn required_id(matches: &ArgMatches, name: &str) -> i64 {
    // Declared with `required(true)`, so clap has already rejected a missing value.
    matches.get_one::<i64>(name).copied().unwrap_or_default()
}

fn required_str<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn print_media(media: &[Medium]) {
    for medium in media {
        let timestamp = medium
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_owned());
        println!(
            "{}\t{}\t{}\t{}x{}\t{}\t{}",
            medium.id,
            timestamp,
            medium.mimetype,
            medium.width,
            medium.height,
            medium.thumbnail,
            medium.filename
        );
    }
}

fn print_albums(albums: &[Album]) {
    for album in albums {
        let lock = if album.locked() { "locked" } else { "open" };
        println!("{}\t{}\t{}", album.id, lock, album.name);
    }
}

fn log_progress(progress: ImportProgress) {
    let stage = match progress.stage {
        ImportStage::Screening => "screening",
        ImportStage::Processing => "processing",
        ImportStage::Cataloging => "cataloging",
    };
    debug!("{stage}: {}/{}", progress.completed, progress.total);
}

fn run_import(catalog: &mut Catalog, matches: &ArgMatches, settings: &AppSettings) -> anyhow::Result<()> {
    let Some(dir) = matches.get_one::<PathBuf>(DIR_ARG) else {
        bail!("missing directory");
    };
    let progress: Arc<dyn Fn(ImportProgress) + Send + Sync> = Arc::new(log_progress);
    let options = ImportOptions {
        workers: matches
            .get_one::<usize>(WORKERS_ARG)
            .copied()
            .or(settings.import_workers),
        progress: Some(progress),
        ..ImportOptions::default()
    };
    let report = catalog
        .import_directory_with_options(dir, &options)
        .with_context(|| format!("import of {} failed", dir.display()))?;

    print_media(&report.imported);
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    eprintln!(
        "imported {} files, skipped {}{}",
        report.imported.len(),
        report.skipped.len(),
        if report.canceled { " (canceled)" } else { "" }
    );
    Ok(())
}

fn run_album(catalog: &mut Catalog, matches: &ArgMatches) -> anyhow::Result<()> {
    let service = catalog.service_mut();
    match matches.subcommand() {
        Some(("create", matches)) => {
            let password = matches.get_one::<String>(PASSWORD_ARG).map(String::as_str);
            let album = service.add_album(required_str(matches, NAME_ARG), password)?;
            println!("{}", album.id);
        }
        Some(("rename", matches)) => {
            service.rename_or_update_album(
                required_id(matches, ID_ARG),
                AlbumUpdate::rename(required_str(matches, NAME_ARG)),
            )?;
        }
        Some(("delete", matches)) => {
            service.delete_album(required_id(matches, ID_ARG))?;
        }
        Some(("add", matches)) => {
            service.link_medium_to_album(
                required_id(matches, MEDIUM_ARG),
                required_id(matches, ALBUM_ARG),
            )?;
        }
        Some(("remove", matches)) => {
            service.unlink_medium_from_album(
                required_id(matches, MEDIUM_ARG),
                required_id(matches, ALBUM_ARG),
            )?;
        }
        Some(("lock", matches)) => {
            let change = PasswordChange::Set(required_str(matches, PASSWORD_ARG).to_owned());
            service.rename_or_update_album(
                required_id(matches, ID_ARG),
                AlbumUpdate::password(change),
            )?;
        }
        Some(("unlock", matches)) => {
            service.rename_or_update_album(
                required_id(matches, ID_ARG),
                AlbumUpdate::password(PasswordChange::Clear),
            )?;
        }
        Some(("check", matches)) => {
            let valid = service.validate_password(
                required_id(matches, ID_ARG),
                required_str(matches, PASSWORD_ARG),
            )?;
            println!("{}", if valid { "valid" } else { "invalid" });
        }
        Some((subcommand, _)) => bail!("unknown album subcommand: {subcommand}"),
        None => bail!("missing album subcommand"),
    }
    Ok(())
}

fn run_collection(catalog: &mut Catalog, matches: &ArgMatches) -> anyhow::Result<()> {
    let service = catalog.service_mut();
    match matches.subcommand() {
        Some(("create", matches)) => {
            let password = matches.get_one::<String>(PASSWORD_ARG).map(String::as_str);
            let collection = service.add_collection(required_str(matches, NAME_ARG), password)?;
            println!("{}", collection.id);
        }
        Some(("rename", matches)) => {
            service.rename_collection(
                required_id(matches, ID_ARG),
                required_str(matches, NAME_ARG),
            )?;
        }
        Some(("delete", matches)) => {
            service.delete_collection(required_id(matches, ID_ARG))?;
        }
        Some(("add", matches)) => {
            service.link_album_to_collection(
                required_id(matches, ALBUM_ARG),
                required_id(matches, COLLECTION_ARG),
            )?;
        }
        Some(("remove", matches)) => {
            service.unlink_album_from_collection(
                required_id(matches, ALBUM_ARG),
                required_id(matches, COLLECTION_ARG),
            )?;
        }
        Some(("albums", matches)) => {
            print_albums(&service.query_albums_in_collection(required_id(matches, ID_ARG))?);
        }
        Some((subcommand, _)) => bail!("unknown collection subcommand: {subcommand}"),
        None => bail!("missing collection subcommand"),
    }
    Ok(())
}

fn run(matches: &ArgMatches, mut settings: AppSettings) -> anyhow::Result<()> {
    apply_overrides(&mut settings, matches);

    if let Some(("settings", matches)) = matches.subcommand() {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        if matches.get_flag(SAVE_ARG) {
            settings.save().context("failed to save settings")?;
        }
        return Ok(());
    }

    let mut catalog = Catalog::open(&settings).context("failed to open catalog")?;

    match matches.subcommand() {
        Some(("init", matches)) => {
            catalog
                .service()
                .create_schema(matches.get_flag(OVERWRITE_ARG))?;
            eprintln!("initialized {}", catalog.path().display());
        }
        Some(("import", matches)) => run_import(&mut catalog, matches, &settings)?,
        Some(("media", matches)) => {
            let album_id = matches.get_one::<i64>(ALBUM_ARG).copied();
            let password = matches.get_one::<String>(PASSWORD_ARG).map(String::as_str);
            print_media(&catalog.service().query_media(album_id, password)?);
        }
        Some(("albums", _)) => print_albums(&catalog.service().query_albums()?),
        Some(("collections", _)) => {
            for collection in catalog.service().query_collections()? {
                println!("{}\t{}", collection.id, collection.name);
            }
        }
        Some(("album", matches)) => run_album(&mut catalog, matches)?,
        Some(("collection", matches)) => run_collection(&mut catalog, matches)?,
        Some(("medium", matches)) => match matches.subcommand() {
            Some(("remove", matches)) => {
                catalog
                    .service_mut()
                    .remove_medium(required_id(matches, ID_ARG))?;
            }
            Some((subcommand, _)) => bail!("unknown medium subcommand: {subcommand}"),
            None => bail!("missing medium subcommand"),
        },
        Some((subcommand, _)) => bail!("unknown subcommand: {subcommand}"),
        None => bail!("missing subcommand"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logging::init_tracing()?;
    let matches = build_command().get_matches();
    run(&matches, load_saved_settings())
}
