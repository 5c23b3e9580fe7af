//! Descriptor public keys with a mandatory key origin.
//!
//! Grammar: `[<fingerprint>/<origin path>]<xpub>[/<tail path>][/*|/*h|/*']`
//!
//! Parsing is delegated to miniscript. The parsed key keeps its source text so that
//! rendering returns exactly what was parsed, including hardened-marker style and
//! fingerprint case. Equality compares the key material, not the text.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use miniscript::descriptor::{DescriptorXKey, Wildcard as MsWildcard};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, Xpub};
use crate::descriptor::DescriptorError;

/// Where an extended key came from: the master fingerprint and the path from the master
/// to the xpub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyOrigin {
    pub fingerprint: Fingerprint,
    pub derivation_path: DerivationPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wildcard {
    None,
    Unhardened,
    Hardened,
}

impl Wildcard {
    fn suffix(&self) -> &'static str {
        match self {
            Wildcard::None => "",
            Wildcard::Unhardened => "/*",
            Wildcard::Hardened => "/*'",
        }
    }
}

impl From<MsWildcard> for Wildcard {
    fn from(wildcard: MsWildcard) -> Self {
        match wildcard {
            MsWildcard::None => Wildcard::None,
            MsWildcard::Unhardened => Wildcard::Unhardened,
            MsWildcard::Hardened => Wildcard::Hardened,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescriptorPublicKey {
    origin: KeyOrigin,
    xpub: Xpub,
    derivation_path: DerivationPath,
    wildcard: Wildcard,
    text: String,
}

fn push_path(out: &mut String, path: &DerivationPath) {
    for child in path {
        match child {
            ChildNumber::Normal { index } => out.push_str(&format!("/{}", index)),
            ChildNumber::Hardened { index } => out.push_str(&format!("/{}'", index)),
        }
    }
}

fn render(
    origin: &KeyOrigin,
    xpub: &Xpub,
    derivation_path: &DerivationPath,
    wildcard: Wildcard,
) -> String {
    let mut out = format!("[{}", origin.fingerprint);
    push_path(&mut out, &origin.derivation_path);
    out.push_str(&format!("]{}", xpub));
    push_path(&mut out, derivation_path);
    out.push_str(wildcard.suffix());
    out
}

impl DescriptorPublicKey {
    /// Builds a key from its parts. The text form uses `'` hardened markers.
    pub fn new(
        origin: KeyOrigin,
        xpub: Xpub,
        derivation_path: DerivationPath,
        wildcard: Wildcard,
    ) -> Result<Self, DescriptorError> {
        if (&derivation_path).into_iter().any(|c| c.is_hardened()) {
            return Err(DescriptorError::HardenedDerivation);
        }
        let text = render(&origin, &xpub, &derivation_path, wildcard);
        Ok(Self {
            origin,
            xpub,
            derivation_path,
            wildcard,
            text,
        })
    }

    pub fn origin(&self) -> &KeyOrigin {
        &self.origin
    }

    pub fn xpub(&self) -> &Xpub {
        &self.xpub
    }

    /// Path appended after the xpub, excluding the wildcard step.
    pub fn derivation_path(&self) -> &DerivationPath {
        &self.derivation_path
    }

    pub fn wildcard(&self) -> Wildcard {
        self.wildcard
    }

    /// Lowercase fingerprint, `'` hardened markers and `/*` or `/*'` wildcard.
    pub fn to_canonical_string(&self) -> String {
        render(&self.origin, &self.xpub, &self.derivation_path, self.wildcard)
    }

    pub fn to_miniscript(&self) -> Result<miniscript::DescriptorPublicKey, DescriptorError> {
        miniscript::DescriptorPublicKey::from_str(&self.text)
            .map_err(|e| DescriptorError::Miniscript(e.to_string()))
    }
}

impl PartialEq for DescriptorPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
            && self.xpub == other.xpub
            && self.derivation_path == other.derivation_path
            && self.wildcard == other.wildcard
    }
}

impl Eq for DescriptorPublicKey {}

impl Hash for DescriptorPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.xpub.hash(state);
        self.derivation_path.hash(state);
        self.wildcard.hash(state);
    }
}

impl fmt::Display for DescriptorPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for DescriptorPublicKey {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = miniscript::DescriptorPublicKey::from_str(s)
            .map_err(|e| DescriptorError::Miniscript(e.to_string()))?;
        let DescriptorXKey {
            origin,
            xkey,
            derivation_path,
            wildcard,
        } = match parsed {
            miniscript::DescriptorPublicKey::XPub(xkey) => xkey,
            miniscript::DescriptorPublicKey::Single(_) => {
                return Err(DescriptorError::UnsupportedKey(
                    "single keys are not extended keys".to_string(),
                ))
            }
            miniscript::DescriptorPublicKey::MultiXPub(_) => {
                return Err(DescriptorError::UnsupportedKey(
                    "multipath keys are not supported".to_string(),
                ))
            }
        };
        let (fingerprint, origin_path) = origin.ok_or(DescriptorError::MissingOrigin)?;
        if (&derivation_path).into_iter().any(|c| c.is_hardened()) {
            return Err(DescriptorError::HardenedDerivation);
        }
        Ok(Self {
            origin: KeyOrigin {
                fingerprint,
                derivation_path: origin_path,
            },
            xpub: xkey,
            derivation_path,
            wildcard: wildcard.into(),
            text: s.to_string(),
        })
    }
}

impl Serialize for DescriptorPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for DescriptorPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DescriptorPublicKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}
