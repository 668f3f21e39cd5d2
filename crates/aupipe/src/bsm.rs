//! BSM record decoding.
//!
//! An audit record is a flat sequence of variable-length tagged tokens:
//! a header, payload tokens (subject, path, arguments, return value, ...)
//! and a trailer. Token lengths are not self-describing, so every token id
//! the kernel can emit for syscall records is parsed here explicitly; an
//! unrecognized id makes the rest of the record undecodable and is
//! reported as an incomplete record.
//!
//! [`Record::render`] produces the comma-delimited single-line text form
//! that assertion patterns are matched against, e.g.
//!
//! ```text
//! header,126,11,mkdir(2),0,1724500000.123,subject,0,0,0,...,path,/tmp/fileforaudit,return,success,0,trailer,126
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::binary::{be_u16, be_u32, be_u64, u8 as byte};
use winnow::combinator::fail;
use winnow::prelude::*;
use winnow::token::{take, take_till};

use crate::error::{Error, Result};
use crate::event::EventTable;
use crate::parse::PResult;

// Token ids from bsm/audit_record.h.
const AUT_TRAILER: u8 = 0x13;
const AUT_HEADER32: u8 = 0x14;
const AUT_HEADER32_EX: u8 = 0x15;
const AUT_IPC: u8 = 0x22;
const AUT_PATH: u8 = 0x23;
const AUT_SUBJECT32: u8 = 0x24;
const AUT_PROCESS32: u8 = 0x26;
const AUT_RETURN32: u8 = 0x27;
const AUT_TEXT: u8 = 0x28;
const AUT_OPAQUE: u8 = 0x29;
const AUT_IN_ADDR: u8 = 0x2a;
const AUT_IP: u8 = 0x2b;
const AUT_IPORT: u8 = 0x2c;
const AUT_ARG32: u8 = 0x2d;
const AUT_SEQ: u8 = 0x2f;
const AUT_ATTR32: u8 = 0x31;
const AUT_IPC_PERM: u8 = 0x32;
const AUT_NEWGROUPS: u8 = 0x3b;
const AUT_EXEC_ARGS: u8 = 0x3c;
const AUT_EXEC_ENV: u8 = 0x3d;
const AUT_EXIT: u8 = 0x52;
const AUT_ZONENAME: u8 = 0x60;
const AUT_ARG64: u8 = 0x71;
const AUT_RETURN64: u8 = 0x72;
const AUT_ATTR64: u8 = 0x73;
const AUT_HEADER64: u8 = 0x74;
const AUT_SUBJECT64: u8 = 0x75;
const AUT_PROCESS64: u8 = 0x77;
const AUT_HEADER64_EX: u8 = 0x79;
const AUT_SUBJECT32_EX: u8 = 0x7a;
const AUT_PROCESS32_EX: u8 = 0x7b;
const AUT_SUBJECT64_EX: u8 = 0x7c;
const AUT_PROCESS64_EX: u8 = 0x7d;
const AUT_IN_ADDR_EX: u8 = 0x7e;
const AUT_SOCKINET32: u8 = 0x80;
const AUT_SOCKINET128: u8 = 0x81;
const AUT_SOCKUNIX: u8 = 0x82;

/// Address type discriminators used by the extended token forms.
const AU_IPV6: u32 = 16;

/// Trailer magic (bsm/audit_record.h).
const TRAILER_MAGIC: u16 = 0xb105;

/// Identity fields shared by subject and process tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct ProcessInfo {
    /// Audit user id.
    pub auid: u32,
    /// Effective user id.
    pub euid: u32,
    /// Effective group id.
    pub egid: u32,
    /// Real user id.
    pub ruid: u32,
    /// Real group id.
    pub rgid: u32,
    /// Process id.
    pub pid: u32,
    /// Audit session id.
    pub sid: u32,
    /// Terminal port.
    pub port: u64,
    /// Terminal address.
    pub addr: IpAddr,
}

/// One decoded BSM token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub enum Token {
    /// Record header: length, version, event and timestamp.
    Header {
        /// Total record length in bytes.
        reclen: u32,
        /// Record version (11 for current BSM).
        version: u8,
        /// Audit event number.
        event: u16,
        /// Event modifier bits.
        modifier: u16,
        /// Seconds since the epoch.
        secs: u64,
        /// Milliseconds within the second.
        msecs: u64,
        /// Originating host, for the extended header forms.
        host: Option<IpAddr>,
    },
    /// Record trailer.
    Trailer {
        /// Total record length, repeated from the header.
        count: u32,
    },
    /// Credentials of the process that triggered the event.
    Subject(ProcessInfo),
    /// Credentials of a process the event refers to.
    Process(ProcessInfo),
    /// Syscall return: errno (0 on success) and return value.
    Return {
        /// errno value; 0 means the syscall succeeded.
        errno: u8,
        /// Raw return value.
        value: u64,
    },
    /// Process exit status.
    Exit {
        /// Exit status.
        status: u32,
        /// Return value.
        value: u32,
    },
    /// Filesystem path argument.
    Path(String),
    /// Free-form text.
    Text(String),
    /// Zone (jail) name.
    Zonename(String),
    /// Uninterpreted bytes.
    Opaque(Vec<u8>),
    /// Numbered syscall argument.
    Argument {
        /// Argument position (1-based).
        index: u8,
        /// Argument value.
        value: u64,
        /// Short argument description.
        text: String,
    },
    /// vnode attributes.
    Attribute {
        /// File mode.
        mode: u32,
        /// Owner uid.
        uid: u32,
        /// Owner gid.
        gid: u32,
        /// Filesystem id.
        fsid: u32,
        /// File (inode) id.
        node: u64,
        /// Device number.
        device: u64,
    },
    /// Bare IP address.
    InAddr(IpAddr),
    /// Raw IP header bytes.
    Ip(Vec<u8>),
    /// Bare IP port (network order as sent).
    Iport(u16),
    /// IPv4/IPv6 socket address.
    SocketInet {
        /// Address family.
        family: u16,
        /// Port number.
        port: u16,
        /// Socket address.
        addr: IpAddr,
    },
    /// Unix domain socket address.
    SocketUnix {
        /// Address family.
        family: u16,
        /// Socket path.
        path: String,
    },
    /// System V IPC object reference.
    Ipc {
        /// IPC object type.
        kind: u8,
        /// IPC object id.
        id: u32,
    },
    /// System V IPC permissions.
    IpcPerm {
        /// Owner uid.
        uid: u32,
        /// Owner gid.
        gid: u32,
        /// Creator uid.
        creator_uid: u32,
        /// Creator gid.
        creator_gid: u32,
        /// Access mode.
        mode: u32,
        /// Slot sequence number.
        seq: u32,
        /// IPC key.
        key: u32,
    },
    /// execve(2) argument vector.
    ExecArgs(Vec<String>),
    /// execve(2) environment.
    ExecEnv(Vec<String>),
    /// Supplementary groups.
    Groups(Vec<u32>),
    /// Sequence number.
    Seq(u32),
}

/// One decoded audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Record {
    /// Tokens in wire order.
    pub tokens: Vec<Token>,
}

/// Decode one raw BSM record into its token sequence.
pub fn decode(data: &[u8]) -> Result<Record> {
    let mut input = data;
    let mut tokens = Vec::new();
    while !input.is_empty() {
        let offset = data.len() - input.len();
        let id = input[0];
        input = &input[1..];
        let token =
            parse_body(id, &mut input).map_err(|_| Error::IncompleteRecord { offset, token: id })?;
        tokens.push(token);
    }
    Ok(Record { tokens })
}

fn parse_body(id: u8, input: &mut &[u8]) -> PResult<Token> {
    match id {
        AUT_HEADER32 => header32(input),
        AUT_HEADER32_EX => header32_ex(input),
        AUT_HEADER64 => header64(input),
        AUT_HEADER64_EX => header64_ex(input),
        AUT_TRAILER => trailer(input),
        AUT_SUBJECT32 => Ok(Token::Subject(process32(input)?)),
        AUT_SUBJECT64 => Ok(Token::Subject(process64(input)?)),
        AUT_SUBJECT32_EX => Ok(Token::Subject(process32_ex(input)?)),
        AUT_SUBJECT64_EX => Ok(Token::Subject(process64_ex(input)?)),
        AUT_PROCESS32 => Ok(Token::Process(process32(input)?)),
        AUT_PROCESS64 => Ok(Token::Process(process64(input)?)),
        AUT_PROCESS32_EX => Ok(Token::Process(process32_ex(input)?)),
        AUT_PROCESS64_EX => Ok(Token::Process(process64_ex(input)?)),
        AUT_RETURN32 => {
            let errno = byte.parse_next(input)?;
            let value = be_u32.parse_next(input)?;
            Ok(Token::Return {
                errno,
                value: value.into(),
            })
        }
        AUT_RETURN64 => {
            let errno = byte.parse_next(input)?;
            let value = be_u64.parse_next(input)?;
            Ok(Token::Return { errno, value })
        }
        AUT_EXIT => {
            let status = be_u32.parse_next(input)?;
            let value = be_u32.parse_next(input)?;
            Ok(Token::Exit { status, value })
        }
        AUT_PATH => Ok(Token::Path(bsm_string(input)?)),
        AUT_TEXT => Ok(Token::Text(bsm_string(input)?)),
        AUT_ZONENAME => Ok(Token::Zonename(bsm_string(input)?)),
        AUT_OPAQUE => {
            let len = be_u16.parse_next(input)?;
            let bytes: &[u8] = take(len as usize).parse_next(input)?;
            Ok(Token::Opaque(bytes.to_vec()))
        }
        AUT_ARG32 => {
            let index = byte.parse_next(input)?;
            let value = be_u32.parse_next(input)?;
            let text = bsm_string(input)?;
            Ok(Token::Argument {
                index,
                value: value.into(),
                text,
            })
        }
        AUT_ARG64 => {
            let index = byte.parse_next(input)?;
            let value = be_u64.parse_next(input)?;
            let text = bsm_string(input)?;
            Ok(Token::Argument { index, value, text })
        }
        AUT_ATTR32 => {
            let (mode, uid, gid, fsid) = quad_u32(input)?;
            let node = be_u64.parse_next(input)?;
            let device = be_u32.parse_next(input)?;
            Ok(Token::Attribute {
                mode,
                uid,
                gid,
                fsid,
                node,
                device: device.into(),
            })
        }
        AUT_ATTR64 => {
            let (mode, uid, gid, fsid) = quad_u32(input)?;
            let node = be_u64.parse_next(input)?;
            let device = be_u64.parse_next(input)?;
            Ok(Token::Attribute {
                mode,
                uid,
                gid,
                fsid,
                node,
                device,
            })
        }
        AUT_IN_ADDR => {
            let addr = be_u32.parse_next(input)?;
            Ok(Token::InAddr(IpAddr::V4(Ipv4Addr::from(addr))))
        }
        AUT_IN_ADDR_EX => Ok(Token::InAddr(ex_addr(input)?)),
        AUT_IP => {
            let bytes: &[u8] = take(20usize).parse_next(input)?;
            Ok(Token::Ip(bytes.to_vec()))
        }
        AUT_IPORT => Ok(Token::Iport(be_u16.parse_next(input)?)),
        AUT_SOCKINET32 => {
            let family = be_u16.parse_next(input)?;
            let port = be_u16.parse_next(input)?;
            let addr = be_u32.parse_next(input)?;
            Ok(Token::SocketInet {
                family,
                port,
                addr: IpAddr::V4(Ipv4Addr::from(addr)),
            })
        }
        AUT_SOCKINET128 => {
            let family = be_u16.parse_next(input)?;
            let port = be_u16.parse_next(input)?;
            let addr = ipv6(input)?;
            Ok(Token::SocketInet { family, port, addr })
        }
        AUT_SOCKUNIX => {
            let family = be_u16.parse_next(input)?;
            let path = nul_string(input)?;
            Ok(Token::SocketUnix { family, path })
        }
        AUT_IPC => {
            let kind = byte.parse_next(input)?;
            let id = be_u32.parse_next(input)?;
            Ok(Token::Ipc { kind, id })
        }
        AUT_IPC_PERM => {
            let (uid, gid, creator_uid, creator_gid) = quad_u32(input)?;
            let mode = be_u32.parse_next(input)?;
            let seq = be_u32.parse_next(input)?;
            let key = be_u32.parse_next(input)?;
            Ok(Token::IpcPerm {
                uid,
                gid,
                creator_uid,
                creator_gid,
                mode,
                seq,
                key,
            })
        }
        AUT_EXEC_ARGS => Ok(Token::ExecArgs(string_vec(input)?)),
        AUT_EXEC_ENV => Ok(Token::ExecEnv(string_vec(input)?)),
        AUT_NEWGROUPS => {
            let count = be_u16.parse_next(input)?;
            let mut groups = Vec::with_capacity(count as usize);
            for _ in 0..count {
                groups.push(be_u32.parse_next(input)?);
            }
            Ok(Token::Groups(groups))
        }
        AUT_SEQ => Ok(Token::Seq(be_u32.parse_next(input)?)),
        _ => fail.parse_next(input),
    }
}

fn header32(input: &mut &[u8]) -> PResult<Token> {
    let reclen = be_u32.parse_next(input)?;
    let version = byte.parse_next(input)?;
    let event = be_u16.parse_next(input)?;
    let modifier = be_u16.parse_next(input)?;
    let secs = be_u32.parse_next(input)?;
    let msecs = be_u32.parse_next(input)?;
    Ok(Token::Header {
        reclen,
        version,
        event,
        modifier,
        secs: secs.into(),
        msecs: msecs.into(),
        host: None,
    })
}

fn header32_ex(input: &mut &[u8]) -> PResult<Token> {
    let reclen = be_u32.parse_next(input)?;
    let version = byte.parse_next(input)?;
    let event = be_u16.parse_next(input)?;
    let modifier = be_u16.parse_next(input)?;
    let host = ex_addr(input)?;
    let secs = be_u32.parse_next(input)?;
    let msecs = be_u32.parse_next(input)?;
    Ok(Token::Header {
        reclen,
        version,
        event,
        modifier,
        secs: secs.into(),
        msecs: msecs.into(),
        host: Some(host),
    })
}

fn header64(input: &mut &[u8]) -> PResult<Token> {
    let reclen = be_u32.parse_next(input)?;
    let version = byte.parse_next(input)?;
    let event = be_u16.parse_next(input)?;
    let modifier = be_u16.parse_next(input)?;
    let secs = be_u64.parse_next(input)?;
    let msecs = be_u64.parse_next(input)?;
    Ok(Token::Header {
        reclen,
        version,
        event,
        modifier,
        secs,
        msecs,
        host: None,
    })
}

fn header64_ex(input: &mut &[u8]) -> PResult<Token> {
    let reclen = be_u32.parse_next(input)?;
    let version = byte.parse_next(input)?;
    let event = be_u16.parse_next(input)?;
    let modifier = be_u16.parse_next(input)?;
    let host = ex_addr(input)?;
    let secs = be_u64.parse_next(input)?;
    let msecs = be_u64.parse_next(input)?;
    Ok(Token::Header {
        reclen,
        version,
        event,
        modifier,
        secs,
        msecs,
        host: Some(host),
    })
}

fn trailer(input: &mut &[u8]) -> PResult<Token> {
    let _magic = be_u16.verify(|m| *m == TRAILER_MAGIC).parse_next(input)?;
    let count = be_u32.parse_next(input)?;
    Ok(Token::Trailer { count })
}

fn ids(input: &mut &[u8]) -> PResult<(u32, u32, u32, u32, u32, u32, u32)> {
    let auid = be_u32.parse_next(input)?;
    let euid = be_u32.parse_next(input)?;
    let egid = be_u32.parse_next(input)?;
    let ruid = be_u32.parse_next(input)?;
    let rgid = be_u32.parse_next(input)?;
    let pid = be_u32.parse_next(input)?;
    let sid = be_u32.parse_next(input)?;
    Ok((auid, euid, egid, ruid, rgid, pid, sid))
}

fn process32(input: &mut &[u8]) -> PResult<ProcessInfo> {
    let (auid, euid, egid, ruid, rgid, pid, sid) = ids(input)?;
    let port = be_u32.parse_next(input)?;
    let addr = be_u32.parse_next(input)?;
    Ok(ProcessInfo {
        auid,
        euid,
        egid,
        ruid,
        rgid,
        pid,
        sid,
        port: port.into(),
        addr: IpAddr::V4(Ipv4Addr::from(addr)),
    })
}

fn process64(input: &mut &[u8]) -> PResult<ProcessInfo> {
    let (auid, euid, egid, ruid, rgid, pid, sid) = ids(input)?;
    let port = be_u64.parse_next(input)?;
    let addr = be_u32.parse_next(input)?;
    Ok(ProcessInfo {
        auid,
        euid,
        egid,
        ruid,
        rgid,
        pid,
        sid,
        port,
        addr: IpAddr::V4(Ipv4Addr::from(addr)),
    })
}

fn process32_ex(input: &mut &[u8]) -> PResult<ProcessInfo> {
    let (auid, euid, egid, ruid, rgid, pid, sid) = ids(input)?;
    let port = be_u32.parse_next(input)?;
    let addr = ex_addr(input)?;
    Ok(ProcessInfo {
        auid,
        euid,
        egid,
        ruid,
        rgid,
        pid,
        sid,
        port: port.into(),
        addr,
    })
}

fn process64_ex(input: &mut &[u8]) -> PResult<ProcessInfo> {
    let (auid, euid, egid, ruid, rgid, pid, sid) = ids(input)?;
    let port = be_u64.parse_next(input)?;
    let addr = ex_addr(input)?;
    Ok(ProcessInfo {
        auid,
        euid,
        egid,
        ruid,
        rgid,
        pid,
        sid,
        port,
        addr,
    })
}

fn quad_u32(input: &mut &[u8]) -> PResult<(u32, u32, u32, u32)> {
    let a = be_u32.parse_next(input)?;
    let b = be_u32.parse_next(input)?;
    let c = be_u32.parse_next(input)?;
    let d = be_u32.parse_next(input)?;
    Ok((a, b, c, d))
}

/// Address type discriminator followed by a 4- or 16-byte address.
fn ex_addr(input: &mut &[u8]) -> PResult<IpAddr> {
    let ad_type = be_u32.parse_next(input)?;
    if ad_type == AU_IPV6 {
        ipv6(input)
    } else {
        let addr = be_u32.parse_next(input)?;
        Ok(IpAddr::V4(Ipv4Addr::from(addr)))
    }
}

fn ipv6(input: &mut &[u8]) -> PResult<IpAddr> {
    let bytes: &[u8] = take(16usize).parse_next(input)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(bytes);
    Ok(IpAddr::V6(Ipv6Addr::from(octets)))
}

/// Length-prefixed string; the length includes the trailing NUL.
fn bsm_string(input: &mut &[u8]) -> PResult<String> {
    let len = be_u16.parse_next(input)?;
    let bytes: &[u8] = take(len as usize).parse_next(input)?;
    let trimmed = match bytes.last() {
        Some(0) => &bytes[..bytes.len() - 1],
        _ => bytes,
    };
    Ok(String::from_utf8_lossy(trimmed).into_owned())
}

/// NUL-terminated string (exec args/env, unix socket paths).
fn nul_string(input: &mut &[u8]) -> PResult<String> {
    let bytes: &[u8] = take_till(0.., |b| b == 0u8).parse_next(input)?;
    let _ = byte.parse_next(input)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Count-prefixed vector of NUL-terminated strings.
fn string_vec(input: &mut &[u8]) -> PResult<Vec<String>> {
    let count = be_u32.parse_next(input)?;
    let mut strings = Vec::with_capacity(count as usize);
    for _ in 0..count {
        strings.push(nul_string(input)?);
    }
    Ok(strings)
}

impl Record {
    /// Event number from the header token, if present.
    pub fn event(&self) -> Option<u16> {
        self.tokens.iter().find_map(|t| match t {
            Token::Header { event, .. } => Some(*event),
            _ => None,
        })
    }

    /// True if the record's return token reports success.
    pub fn succeeded(&self) -> Option<bool> {
        self.tokens.iter().find_map(|t| match t {
            Token::Return { errno, .. } => Some(*errno == 0),
            _ => None,
        })
    }

    /// Render the record as one comma-delimited line.
    ///
    /// `events` resolves header event numbers to their database
    /// descriptions, so patterns can match on syscall names.
    pub fn render(&self, events: &EventTable) -> String {
        let parts: Vec<String> = self.tokens.iter().map(|t| t.render(events)).collect();
        parts.join(",")
    }
}

impl Token {
    fn render(&self, events: &EventTable) -> String {
        match self {
            Token::Header {
                reclen,
                version,
                event,
                modifier,
                secs,
                msecs,
                host,
            } => {
                let mut out = format!(
                    "header,{reclen},{version},{},{modifier},{secs}.{msecs:03}",
                    events.describe(*event)
                );
                if let Some(host) = host {
                    out.push(',');
                    out.push_str(&host.to_string());
                }
                out
            }
            Token::Trailer { count } => format!("trailer,{count}"),
            Token::Subject(info) => format!("subject,{}", info.render()),
            Token::Process(info) => format!("process,{}", info.render()),
            Token::Return { errno, value } => {
                if *errno == 0 {
                    format!("return,success,{value}")
                } else {
                    format!(
                        "return,failure : {},{value}",
                        io::Error::from_raw_os_error(i32::from(*errno))
                    )
                }
            }
            Token::Exit { status, value } => format!("exit,{status},{value}"),
            Token::Path(path) => format!("path,{path}"),
            Token::Text(text) => format!("text,{text}"),
            Token::Zonename(name) => format!("zone,{name}"),
            Token::Opaque(bytes) => format!("opaque,{} bytes", bytes.len()),
            Token::Argument { index, value, text } => {
                format!("argument,{index},{value:#x},{text}")
            }
            Token::Attribute {
                mode,
                uid,
                gid,
                fsid,
                node,
                device,
            } => format!("attribute,{mode:o},{uid},{gid},{fsid},{node},{device}"),
            Token::InAddr(addr) => format!("ip addr,{addr}"),
            Token::Ip(raw) => format!("ip,{} bytes", raw.len()),
            Token::Iport(port) => format!("ip port,{port}"),
            Token::SocketInet { family, port, addr } => {
                format!("socket-inet,{family},{port},{addr}")
            }
            Token::SocketUnix { family, path } => format!("socket-unix,{family},{path}"),
            Token::Ipc { kind, id } => format!("IPC,{kind},{id}"),
            Token::IpcPerm {
                uid,
                gid,
                creator_uid,
                creator_gid,
                mode,
                seq,
                key,
            } => format!("IPC perm,{uid},{gid},{creator_uid},{creator_gid},{mode:o},{seq},{key}"),
            Token::ExecArgs(args) => format!("exec arg,{}", args.join(",")),
            Token::ExecEnv(env) => format!("exec env,{}", env.join(",")),
            Token::Groups(groups) => {
                let list: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
                format!("group,{}", list.join(","))
            }
            Token::Seq(n) => format!("sequence,{n}"),
        }
    }
}

impl ProcessInfo {
    fn render(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.auid,
            self.euid,
            self.egid,
            self.ruid,
            self.rgid,
            self.pid,
            self.sid,
            self.port,
            self.addr
        )
    }
}
