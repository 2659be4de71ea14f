use std::path::Path;

use kmt_catalog::Recipe;
use url::Url;

use crate::document::VmSetRecord;

const COMPRESSION_SUFFIX: &str = ".xz";

/// Maps a remote image url onto the local image cache.
///
/// Strings that are not remote urls (including `file://` urls) are left as is.
pub fn url_to_fspath(source: &str, rootfs_dir: &Path) -> String {
    let Ok(url) = Url::parse(source) else {
        return source.to_owned();
    };
    if url.scheme() == "file" {
        return source.to_owned();
    }

    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let filename = basename
        .strip_suffix(COMPRESSION_SUFFIX)
        .unwrap_or(basename);

    format!("file://{}", rootfs_dir.join(filename).display())
}

/// Points every image a set boots from at the local image cache.
pub fn image_source_to_path(vmset: &mut VmSetRecord, rootfs_dir: &Path) {
    if vmset.recipe_kind() == Some(Recipe::Custom) {
        if let Some(image) = vmset.image.as_mut() {
            image.image_source = url_to_fspath(&image.image_source, rootfs_dir);
        }
        return;
    }

    for kernel in vmset.kernels.iter_mut() {
        if let Some(source) = kernel.image_source.as_mut() {
            *source = url_to_fspath(source, rootfs_dir);
        }
    }

    for disk in vmset.disks.iter_mut().flatten() {
        disk.source = url_to_fspath(&disk.source, rootfs_dir);
    }
}
