use crate::{Arch, KernelVersion};

/// Which part of the image matrix to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub distro: bool,
    pub custom: bool,
}

impl ImageFilter {
    fn includes_distro(&self) -> bool {
        self.distro || !self.custom
    }

    fn includes_custom(&self) -> bool {
        self.custom || !self.distro
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSupport {
    pub name: String,
    pub x86_64: bool,
    pub arm64: bool,
}

impl ImageSupport {
    fn new(name: impl Into<String>, x86_64: bool, arm64: bool) -> Self {
        Self {
            name: name.into(),
            x86_64,
            arm64,
        }
    }

    pub fn supports(&self, arch: Arch) -> bool {
        match arch {
            Arch::X86_64 => self.x86_64,
            Arch::Arm64 => self.arm64,
        }
    }
}

const DISTRO_IMAGES: &[(&str, bool, bool)] = &[
    ("ubuntu-18 (bionic)", true, false),
    ("ubuntu-20 (focal)", true, true),
    ("ubuntu-22 (jammy)", true, true),
    ("amazon linux 2 - v4.14", true, true),
    ("amazon linux 2 - v5.4", true, true),
    ("amazon linux 2 - v5.10", true, true),
    ("amazon linux 2 - v5.15", true, false),
    ("fedora 35 - v5.14.10", true, true),
    ("fedora 36 - v5.17.5", true, true),
    ("fedora 37 - v6.0.7", true, true),
    ("fedora 38 - v6.2.9", true, true),
    ("debian 10 - v4.19.0", true, true),
    ("debian 11 - v5.10.0", true, true),
];

pub(crate) fn image_support(kernels: &[String], filter: ImageFilter) -> Vec<ImageSupport> {
    let mut rows = Vec::new();

    if filter.includes_distro() {
        rows.extend(
            DISTRO_IMAGES
                .iter()
                .map(|(name, x86_64, arm64)| ImageSupport::new(*name, *x86_64, *arm64)),
        );
    }

    if filter.includes_custom() {
        for kernel in kernels {
            // legacy kernels are not built for arm64
            let legacy = kernel
                .parse::<KernelVersion>()
                .map(|version| version.is_legacy())
                .unwrap_or(false);
            rows.push(ImageSupport::new(
                format!("custom kernel v{kernel}"),
                true,
                !legacy,
            ));
        }
    }

    rows
}
