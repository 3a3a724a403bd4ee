//! portable commitment json, every field element as a decimal string

use pool_primitives::field::{parse_decimal, to_decimal};
use pool_primitives::{FieldElement, Point};
use serde::{Deserialize, Serialize};

use crate::commitment::{Cipher, Commitment, PrivateParts, PublicParts, CIPHER_SIZE};
use crate::error::{PoolError, Result};
use crate::value::Amount;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortablePublic {
    pub scope: String,
    pub cipher: Vec<String>,
    #[serde(rename = "saltPk")]
    pub salt_pk: [String; 2],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortablePrivate {
    pub value: String,
    pub secret: [String; 2],
    pub nonce: String,
    pub pk_scalar: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortableCommitment {
    pub public: PortablePublic,
    pub private: PortablePrivate,
    pub hash: String,
    #[serde(rename = "cRoot")]
    pub commitment_root: String,
    #[serde(rename = "nullRoot")]
    pub null_root: String,
}

fn point_strings(p: &Point) -> [String; 2] {
    [to_decimal(&p.x), to_decimal(&p.y)]
}

fn parse_field(s: &str) -> Result<FieldElement> {
    Ok(parse_decimal(s)?)
}

// unchecked, the placeholder carries (0, 0) and the root comparison
// catches any other edit
fn parse_point(p: &[String; 2]) -> Result<Point> {
    Ok(Point::from_coordinates(parse_field(&p[0])?, parse_field(&p[1])?))
}

impl Commitment {
    pub fn to_portable(&self) -> PortableCommitment {
        let private = self.private_parts();
        let public = self.public_parts();
        PortableCommitment {
            public: PortablePublic {
                scope: to_decimal(&public.scope),
                cipher: public.cipher.iter().map(to_decimal).collect(),
                salt_pk: point_strings(&public.salt_public_key),
            },
            private: PortablePrivate {
                value: private.value.to_string(),
                secret: point_strings(&private.secret),
                nonce: private.nonce.to_string(),
                pk_scalar: to_decimal(&private.owner),
            },
            hash: to_decimal(&self.hash()),
            commitment_root: to_decimal(&self.commitment_root()),
            null_root: to_decimal(&self.null_root()),
        }
    }

    /// rebuild and check the stored derived values
    pub fn from_portable(doc: &PortableCommitment) -> Result<Self> {
        if doc.public.cipher.len() != CIPHER_SIZE {
            return Err(PoolError::Serialization(format!(
                "cipher must have {CIPHER_SIZE} elements, got {}",
                doc.public.cipher.len()
            )));
        }
        let mut cipher: Cipher = [FieldElement::default(); CIPHER_SIZE];
        for (slot, s) in cipher.iter_mut().zip(&doc.public.cipher) {
            *slot = parse_field(s)?;
        }

        let value = doc
            .private
            .value
            .parse::<u128>()
            .map_err(|e| PoolError::Serialization(format!("value: {e}")))?;
        let nonce = doc
            .private
            .nonce
            .parse::<u64>()
            .map_err(|e| PoolError::Serialization(format!("nonce: {e}")))?;

        let commitment = Commitment::from_parts(
            PrivateParts {
                owner: parse_field(&doc.private.pk_scalar)?,
                nonce,
                value: Amount(value),
                secret: parse_point(&doc.private.secret)?,
            },
            PublicParts {
                scope: parse_field(&doc.public.scope)?,
                cipher,
                salt_public_key: parse_point(&doc.public.salt_pk)?,
            },
        );

        if commitment.hash() != parse_field(&doc.hash)? {
            return Err(PoolError::PortableMismatch("hash"));
        }
        if commitment.commitment_root() != parse_field(&doc.commitment_root)? {
            return Err(PoolError::PortableMismatch("cRoot"));
        }
        if commitment.null_root() != parse_field(&doc.null_root)? {
            return Err(PoolError::PortableMismatch("nullRoot"));
        }
        Ok(commitment)
    }

    pub fn to_portable_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_portable())?)
    }

    pub fn from_portable_json(json: &str) -> Result<Self> {
        let doc: PortableCommitment = serde_json::from_str(json)?;
        Self::from_portable(&doc)
    }
}
