use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::many0 as nom_many0;
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use super::certificate_status::CERTIFICATE_STATUS_OCSP;
use super::{opaque16, opaque8};
use crate::buffer::Buf;
use crate::types::{NamedGroup, SignatureAndHashAlgorithm};
use crate::util::many1;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    UseSrtp,
    Heartbeat,
    ApplicationLayerProtocolNegotiation,
    Padding,
    EncryptThenMac,
    ExtendedMasterSecret,
    SessionTicket,
    SupportedVersions,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x0001 => ExtensionType::MaxFragmentLength,
            0x0005 => ExtensionType::StatusRequest,
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x000E => ExtensionType::UseSrtp,
            0x000F => ExtensionType::Heartbeat,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0015 => ExtensionType::Padding,
            0x0016 => ExtensionType::EncryptThenMac,
            0x0017 => ExtensionType::ExtendedMasterSecret,
            0x0023 => ExtensionType::SessionTicket,
            0x002B => ExtensionType::SupportedVersions,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::MaxFragmentLength => 0x0001,
            ExtensionType::StatusRequest => 0x0005,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::UseSrtp => 0x000E,
            ExtensionType::Heartbeat => 0x000F,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::Padding => 0x0015,
            ExtensionType::EncryptThenMac => 0x0016,
            ExtensionType::ExtendedMasterSecret => 0x0017,
            ExtensionType::SessionTicket => 0x0023,
            ExtensionType::SupportedVersions => 0x002B,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

fn point_format(input: &[u8]) -> IResult<&[u8], u8> {
    be_u8(input)
}

/// ec_point_formats value for uncompressed points.
pub const EC_POINT_FORMAT_UNCOMPRESSED: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub extension_data: Vec<u8>,
}

impl Extension {
    pub fn new(extension_type: ExtensionType, extension_data: &[u8]) -> Self {
        Extension {
            extension_type,
            extension_data: extension_data.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((input, Extension::new(extension_type, extension_data)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.put_u16(self.extension_type.as_u16());
        output.put_opaque16(&self.extension_data);
    }
}

/// Hello extensions in wire order. Each type appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.0.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = ExtensionType> + '_ {
        self.0.iter().map(|e| e.extension_type)
    }

    pub fn contains(&self, extension_type: ExtensionType) -> bool {
        self.get(extension_type).is_some()
    }

    pub fn get(&self, extension_type: ExtensionType) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|e| e.extension_type == extension_type)
            .map(|e| e.extension_data.as_slice())
    }

    /// Insert or replace.
    pub fn set(&mut self, extension_type: ExtensionType, data: &[u8]) {
        match self.0.iter_mut().find(|e| e.extension_type == extension_type) {
            Some(e) => e.extension_data = data.to_vec(),
            None => self.0.push(Extension::new(extension_type, data)),
        }
    }

    /// Parse the optional trailing extensions block of a hello message.
    ///
    /// No bytes at all means no extensions.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Extensions> {
        if input.is_empty() {
            return Ok((input, Extensions::new()));
        }
        let (input, block) = opaque16(input)?;
        let (_, list) = all_consuming(nom_many0(Extension::parse))(block)?;

        for (i, e) in list.iter().enumerate() {
            if list[..i].iter().any(|p| p.extension_type == e.extension_type) {
                return Err(Err::Failure(NomError::new(block, ErrorKind::Verify)));
            }
        }

        Ok((input, Extensions(list)))
    }

    /// Write the extensions block, or nothing when empty.
    pub fn serialize(&self, output: &mut Buf) {
        if self.0.is_empty() {
            return;
        }
        let mut block = Buf::new();
        for e in &self.0 {
            e.serialize(&mut block);
        }
        output.put_opaque16(&block);
    }

    pub fn add_renegotiation_info(&mut self, renegotiated_connection: &[u8]) {
        let mut data = Buf::new();
        data.put_opaque8(renegotiated_connection);
        self.set(ExtensionType::RenegotiationInfo, &data);
    }

    /// The renegotiated_connection field, when present.
    pub fn renegotiation_info(&self) -> Result<Option<Vec<u8>>, Error> {
        self.get(ExtensionType::RenegotiationInfo)
            .map(|data| -> Result<Vec<u8>, Error> {
                let (_, inner) = all_consuming(opaque8)(data)?;
                Ok(inner.to_vec())
            })
            .transpose()
    }

    pub fn add_extended_master_secret(&mut self) {
        self.set(ExtensionType::ExtendedMasterSecret, &[]);
    }

    /// Whether extended_master_secret is present. Its body must be empty.
    pub fn extended_master_secret(&self) -> Result<bool, Error> {
        match self.get(ExtensionType::ExtendedMasterSecret) {
            None => Ok(false),
            Some([]) => Ok(true),
            Some(_) => Err(Error::decode_error("extended_master_secret with a body")),
        }
    }

    pub fn add_ec_point_formats(&mut self, formats: &[u8]) {
        let mut data = Buf::new();
        data.put_opaque8(formats);
        self.set(ExtensionType::EcPointFormats, &data);
    }

    pub fn ec_point_formats(&self) -> Result<Option<ArrayVec<[u8; 16]>>, Error> {
        self.get(ExtensionType::EcPointFormats)
            .map(|data| -> Result<ArrayVec<[u8; 16]>, Error> {
                let (_, list) = all_consuming(opaque8)(data)?;
                let (_, formats) = all_consuming(many1(point_format))(list)?;
                Ok(formats)
            })
            .transpose()
    }

    pub fn add_supported_groups(&mut self, groups: &[NamedGroup]) {
        let mut list = Buf::new();
        for g in groups {
            list.put_u16(g.as_u16());
        }
        let mut data = Buf::new();
        data.put_opaque16(&list);
        self.set(ExtensionType::SupportedGroups, &data);
    }

    pub fn supported_groups(&self) -> Result<Option<Vec<NamedGroup>>, Error> {
        self.get(ExtensionType::SupportedGroups)
            .map(|data| -> Result<Vec<NamedGroup>, Error> {
                let (_, list) = all_consuming(opaque16)(data)?;
                let (_, groups) = all_consuming(nom_many0(NamedGroup::parse))(list)?;
                Ok(groups)
            })
            .transpose()
    }

    pub fn add_signature_algorithms(&mut self, algorithms: &[SignatureAndHashAlgorithm]) {
        let mut list = Buf::new();
        for a in algorithms {
            list.put_u16(a.as_u16());
        }
        let mut data = Buf::new();
        data.put_opaque16(&list);
        self.set(ExtensionType::SignatureAlgorithms, &data);
    }

    pub fn signature_algorithms(&self) -> Result<Option<Vec<SignatureAndHashAlgorithm>>, Error> {
        self.get(ExtensionType::SignatureAlgorithms)
            .map(|data| -> Result<Vec<SignatureAndHashAlgorithm>, Error> {
                let (_, list) = all_consuming(opaque16)(data)?;
                let (_, algs) = all_consuming(nom_many0(SignatureAndHashAlgorithm::parse))(list)?;
                Ok(algs)
            })
            .transpose()
    }

    pub fn add_max_fragment_length(&mut self, code: u8) {
        self.set(ExtensionType::MaxFragmentLength, &[code]);
    }

    pub fn max_fragment_length(&self) -> Result<Option<u8>, Error> {
        match self.get(ExtensionType::MaxFragmentLength) {
            None => Ok(None),
            Some([code]) => Ok(Some(*code)),
            Some(_) => Err(Error::decode_error("max_fragment_length body")),
        }
    }

    /// Ask for a stapled OCSP response, naming no responders and no
    /// request extensions.
    pub fn add_status_request(&mut self) {
        self.set(ExtensionType::StatusRequest, &[CERTIFICATE_STATUS_OCSP, 0, 0, 0, 0]);
    }

    /// Whether a client status_request asks for OCSP.
    pub fn status_request_ocsp(&self) -> bool {
        matches!(
            self.get(ExtensionType::StatusRequest),
            Some([CERTIFICATE_STATUS_OCSP, ..])
        )
    }

    pub fn add_session_ticket(&mut self, ticket: &[u8]) {
        self.set(ExtensionType::SessionTicket, ticket);
    }

    pub fn session_ticket(&self) -> Option<Vec<u8>> {
        // The body is the ticket itself, without a length prefix.
        self.get(ExtensionType::SessionTicket).map(|data| data.to_vec())
    }
}

impl FromIterator<Extension> for Extensions {
    fn from_iter<T: IntoIterator<Item = Extension>>(iter: T) -> Self {
        Extensions(iter.into_iter().collect())
    }
}
