//! DNS wire codec
//!
//! A minimal RFC 1035 message codec: header, questions and generic resource
//! records. Parsing follows compression pointers; packing never compresses.
//! Parsing never panics on hostile input, every bounds check turns into
//! [`QueryError::MalformedPacket`].

use std::fmt;

use crate::address::{Address, ADDRESS_LENGTH};
use crate::dns::error::{encoding, malformed, QueryError};
use crate::types::{CLASS_IN, TYPE_A, TYPE_AAAA};

/// DNS packet constants
pub const DNS_HEADER_SIZE: usize = 12;
pub const DNS_MAX_UDP_PAYLOAD: usize = 512;
const MAX_LABEL_LENGTH: usize = 63;
const MAX_NAME_LENGTH: usize = 255;
const MAX_POINTER_HOPS: usize = 32;

/// DNS flags
pub const FLAG_QR: u16 = 0x8000; // Query/Response
pub const FLAG_AA: u16 = 0x0400; // Authoritative Answer
pub const FLAG_RD: u16 = 0x0100; // Recursion Desired
const OPCODE_MASK: u16 = 0x7800;

/// A domain name as its raw wire labels
///
/// Labels are arbitrary bytes; they need not be UTF-8 and may contain `.`.
/// Text forms escape `.` and `\` inside a label with a backslash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    labels: Vec<Vec<u8>>,
}

impl Name {
    /// Build a name from presentation text; the trailing dot is optional
    #[cfg(test)]
    pub fn new(name: &str) -> Self {
        if name.is_empty() || name == "." {
            return Self::default();
        }

        let mut labels = Vec::new();
        let mut label = Vec::new();
        let mut bytes = name.bytes();
        while let Some(b) = bytes.next() {
            match b {
                b'\\' => label.extend(bytes.next()),
                b'.' => labels.push(std::mem::take(&mut label)),
                _ => label.push(b),
            }
        }
        if !label.is_empty() {
            labels.push(label);
        }
        Self { labels }
    }

    pub fn from_labels(labels: Vec<Vec<u8>>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// Bytes on the wire, including the root terminator
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Presentation bytes: escaped labels joined by `.`, with a trailing `.`
    pub fn to_text(&self) -> Vec<u8> {
        if self.labels.is_empty() {
            return b".".to_vec();
        }
        let mut out = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            for &b in label {
                if b == b'.' || b == b'\\' {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b'.');
        }
        out
    }

    /// Return the part of the name before `suffix`, comparing ASCII
    /// case-insensitively. A name equal to the suffix yields an empty label.
    pub fn strip_suffix_ignore_case(&self, suffix: &str) -> Option<Vec<u8>> {
        let mut text = self.to_text();
        let split = text.len().checked_sub(suffix.len())?;
        if !text[split..].eq_ignore_ascii_case(suffix.as_bytes()) {
            return None;
        }
        text.truncate(split);
        Some(text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_text()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
}

impl Header {
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags & OPCODE_MASK) >> 11) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub qtype: u16,
    pub qclass: u16,
}

/// A resource record with opaque RDATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: Name,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub data: Vec<u8>,
}

impl Record {
    /// The address carried by an AAAA record
    pub fn aaaa_address(&self) -> Option<Address> {
        if self.rtype != TYPE_AAAA {
            return None;
        }
        let bytes: [u8; ADDRESS_LENGTH] = self.data.as_slice().try_into().ok()?;
        Some(Address::from_bytes(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additional: Vec<Record>,
}

impl Message {
    /// Build the authoritative AAAA response to `question` from `request`
    ///
    /// The question is echoed unless that would push the response past the
    /// classic 512-byte UDP payload; the answer alone always fits.
    pub fn aaaa_answer(request: &Message, question: &Question, address: Address, ttl: u32) -> Self {
        let answer_len = question.name.wire_len() + 10 + ADDRESS_LENGTH;
        let question_len = question.name.wire_len() + 4;
        let questions = if DNS_HEADER_SIZE + answer_len + question_len <= DNS_MAX_UDP_PAYLOAD {
            vec![question.clone()]
        } else {
            Vec::new()
        };

        Self {
            header: Header {
                id: request.header.id,
                flags: FLAG_QR | FLAG_AA | (request.header.flags & FLAG_RD),
            },
            questions,
            answers: vec![Record {
                name: question.name.clone(),
                rtype: TYPE_AAAA,
                rclass: CLASS_IN,
                ttl,
                data: address.as_bytes().to_vec(),
            }],
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Decode a message from wire bytes
    pub fn parse(packet: &[u8]) -> Result<Self, QueryError> {
        if packet.len() < DNS_HEADER_SIZE {
            return Err(malformed(format!("packet too short: {} bytes", packet.len())));
        }

        let mut reader = Reader { buf: packet, pos: 0 };
        let id = reader.u16()?;
        let flags = reader.u16()?;
        let qdcount = reader.u16()?;
        let ancount = reader.u16()?;
        let nscount = reader.u16()?;
        let arcount = reader.u16()?;

        let mut questions = Vec::with_capacity(usize::from(qdcount).min(16));
        for _ in 0..qdcount {
            let name = reader.name()?;
            let qtype = reader.u16()?;
            let qclass = reader.u16()?;
            questions.push(Question { name, qtype, qclass });
        }

        let answers = reader.records(ancount)?;
        let authority = reader.records(nscount)?;
        let additional = reader.records(arcount)?;

        Ok(Self {
            header: Header { id, flags },
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Encode the message to wire bytes, uncompressed
    pub fn pack(&self) -> Result<Vec<u8>, QueryError> {
        let mut out = Vec::with_capacity(DNS_HEADER_SIZE + 64);

        out.extend_from_slice(&self.header.id.to_be_bytes());
        out.extend_from_slice(&self.header.flags.to_be_bytes());
        for count in [
            self.questions.len(),
            self.answers.len(),
            self.authority.len(),
            self.additional.len(),
        ] {
            let count = u16::try_from(count).map_err(|_| encoding("too many records in section"))?;
            out.extend_from_slice(&count.to_be_bytes());
        }

        for question in &self.questions {
            write_name(&mut out, &question.name)?;
            out.extend_from_slice(&question.qtype.to_be_bytes());
            out.extend_from_slice(&question.qclass.to_be_bytes());
        }

        for record in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            write_record(&mut out, record)?;
        }

        Ok(out)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8], QueryError> {
        let end = self.pos.checked_add(len).ok_or_else(|| malformed("length overflow"))?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| malformed(format!("truncated at offset {}", self.pos)))?;
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, QueryError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, QueryError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn name(&mut self) -> Result<Name, QueryError> {
        let mut labels = Vec::new();
        let mut pos = self.pos;
        let mut resume = None;
        let mut hops = 0;
        let mut wire_len = 1;

        loop {
            let len = *self
                .buf
                .get(pos)
                .ok_or_else(|| malformed("truncated name"))? as usize;

            match len & 0xC0 {
                0x00 if len == 0 => {
                    pos += 1;
                    break;
                }
                0x00 => {
                    let start = pos + 1;
                    let raw = self
                        .buf
                        .get(start..start + len)
                        .ok_or_else(|| malformed("truncated label"))?;
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LENGTH {
                        return Err(malformed("name too long"));
                    }
                    labels.push(raw.to_vec());
                    pos = start + len;
                }
                0xC0 => {
                    let low = *self
                        .buf
                        .get(pos + 1)
                        .ok_or_else(|| malformed("truncated compression pointer"))?
                        as usize;
                    let target = ((len & 0x3F) << 8) | low;
                    // Only backward pointers, so every jump makes progress.
                    if target >= pos {
                        return Err(malformed("forward compression pointer"));
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(malformed("too many compression pointers"));
                    }
                    resume.get_or_insert(pos + 2);
                    pos = target;
                }
                _ => return Err(malformed(format!("unsupported label type 0x{:02x}", len))),
            }
        }

        self.pos = resume.unwrap_or(pos);
        Ok(Name::from_labels(labels))
    }

    fn records(&mut self, count: u16) -> Result<Vec<Record>, QueryError> {
        let mut records = Vec::with_capacity(usize::from(count).min(16));
        for _ in 0..count {
            let name = self.name()?;
            let rtype = self.u16()?;
            let rclass = self.u16()?;
            let ttl = self.u32()?;
            let rdlength = self.u16()?;
            let data = self.bytes(usize::from(rdlength))?.to_vec();
            records.push(Record {
                name,
                rtype,
                rclass,
                ttl,
                data,
            });
        }
        Ok(records)
    }
}

fn write_name(out: &mut Vec<u8>, name: &Name) -> Result<(), QueryError> {
    if name.wire_len() > MAX_NAME_LENGTH {
        return Err(encoding(format!("name longer than {} bytes", MAX_NAME_LENGTH)));
    }

    for label in name.labels() {
        if label.is_empty() {
            return Err(encoding(format!("empty label in {}", name)));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(encoding(format!("label longer than {} bytes in {}", MAX_LABEL_LENGTH, name)));
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label);
    }
    out.push(0);
    Ok(())
}

fn write_record(out: &mut Vec<u8>, record: &Record) -> Result<(), QueryError> {
    let expected = match record.rtype {
        TYPE_A => Some(4),
        TYPE_AAAA => Some(ADDRESS_LENGTH),
        _ => None,
    };
    if let Some(expected) = expected {
        if record.data.len() != expected {
            return Err(encoding(format!(
                "type {} record carries {} bytes, expected {}",
                record.rtype,
                record.data.len(),
                expected
            )));
        }
    }
    let rdlength = u16::try_from(record.data.len()).map_err(|_| encoding("record data too long"))?;

    write_name(out, &record.name)?;
    out.extend_from_slice(&record.rtype.to_be_bytes());
    out.extend_from_slice(&record.rclass.to_be_bytes());
    out.extend_from_slice(&record.ttl.to_be_bytes());
    out.extend_from_slice(&rdlength.to_be_bytes());
    out.extend_from_slice(&record.data);
    Ok(())
}
