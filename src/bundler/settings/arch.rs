//! Target architecture for the produced package.

use std::{fmt, str::FromStr};

/// CPU architecture of the package, in Debian naming.
///
/// # Examples
///
/// ```
/// use pkgr::bundler::Arch;
///
/// let arch: Arch = "amd64".parse().unwrap();
/// assert_eq!(arch.as_str(), "amd64");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 (64-bit)
    Amd64,
    /// x86 (32-bit)
    I386,
    /// AArch64 / ARM64 (64-bit)
    Arm64,
    /// ARM with hard-float (32-bit)
    Armhf,
}

impl Arch {
    /// All supported architectures.
    pub const ALL: [Arch; 4] = [Arch::Amd64, Arch::I386, Arch::Arm64, Arch::Armhf];

    /// Debian architecture name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::I386 => "i386",
            Arch::Arm64 => "arm64",
            Arch::Armhf => "armhf",
        }
    }

    /// Maps the architecture this binary runs on, falling back to amd64.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "x86" => Arch::I386,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Armhf,
            _ => Arch::Amd64,
        }
    }
}

impl Default for Arch {
    fn default() -> Self {
        Arch::host()
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "i386" | "i686" | "x86" => Ok(Arch::I386),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "armhf" => Ok(Arch::Armhf),
            other => Err(format!(
                "unsupported architecture '{}' (expected one of: {})",
                other,
                Arch::ALL.map(|a| a.as_str()).join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_debian_and_rust_names() {
        assert_eq!("amd64".parse::<Arch>(), Ok(Arch::Amd64));
        assert_eq!("x86_64".parse::<Arch>(), Ok(Arch::Amd64));
        assert_eq!("i386".parse::<Arch>(), Ok(Arch::I386));
        assert_eq!("aarch64".parse::<Arch>(), Ok(Arch::Arm64));
        assert!("sparc".parse::<Arch>().unwrap_err().contains("amd64, i386"));
    }
}
