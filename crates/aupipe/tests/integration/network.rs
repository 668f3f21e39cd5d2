//! Network syscall auditing tests.
//!
//! Socket syscall records carry their arguments as numeric tokens rather
//! than paths, so patterns anchor on argument values (invalid arguments
//! render as 0xffffffff) or on the test pid. Unix domain sockets are the
//! exception and expose the bound path.

use std::mem;

use aupipe::{AuditSession, Result};
use regex::Regex;

use crate::common::{pid, Scratch};

fn pat(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn tcp_socket() -> i32 {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0);
    fd
}

fn unix_addr(scratch: &Scratch) -> libc::sockaddr_un {
    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_len = mem::size_of::<libc::sockaddr_un>() as u8;
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    let bytes = scratch.as_cstr();
    let bytes = bytes.as_bytes_with_nul();
    assert!(bytes.len() <= addr.sun_path.len());
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    addr
}

#[test]
fn test_socket_success() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("nt")?;

    let fd = tcp_socket();
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!("socket.*{}.*return,success", pid())))?;
    Ok(())
}

#[test]
fn test_socket_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("nt")?;

    let ret = unsafe { libc::socket(-1, libc::SOCK_STREAM, 0) };
    assert_eq!(ret, -1);

    session.expect_record(&pat("socket.*0xffffffff.*return,failure"))?;
    Ok(())
}

#[test]
fn test_setsockopt_success() -> Result<()> {
    require_root!();

    let fd = tcp_socket();
    let mut session = AuditSession::begin("nt")?;

    let on: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&on as *const libc::c_int).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, 0);
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!("setsockopt.*{}.*return,success", pid())))?;
    Ok(())
}

#[test]
fn test_setsockopt_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("nt")?;

    let on: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            -1,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&on as *const libc::c_int).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, -1);

    session.expect_record(&pat("setsockopt.*0xffffffff.*return,failure"))?;
    Ok(())
}

#[test]
fn test_bind_unix_success() -> Result<()> {
    require_root!();

    let sock_path = Scratch::new("bind");
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0);
    let mut session = AuditSession::begin("nt")?;

    let addr = unix_addr(&sock_path);
    let ret = unsafe {
        libc::bind(
            fd,
            (&addr as *const libc::sockaddr_un).cast(),
            mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, 0);
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!(
        "bind.*{}.*return,success",
        sock_path.name()
    )))?;
    Ok(())
}

#[test]
fn test_bind_failure() -> Result<()> {
    require_root!();

    let sock_path = Scratch::new("bind-fail");
    let mut session = AuditSession::begin("nt")?;

    let addr = unix_addr(&sock_path);
    let ret = unsafe {
        libc::bind(
            -1,
            (&addr as *const libc::sockaddr_un).cast(),
            mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, -1);

    session.expect_record(&pat("bind.*0xffffffff.*return,failure"))?;
    Ok(())
}

#[test]
fn test_connect_unix_failure() -> Result<()> {
    require_root!();

    // Nothing listens at the scratch path, so connect must fail.
    let sock_path = Scratch::new("connect");
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0);
    let mut session = AuditSession::begin("nt")?;

    let addr = unix_addr(&sock_path);
    let ret = unsafe {
        libc::connect(
            fd,
            (&addr as *const libc::sockaddr_un).cast(),
            mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, -1);
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!(
        "connect.*{}.*return,failure",
        sock_path.name()
    )))?;
    Ok(())
}

#[test]
fn test_listen_success() -> Result<()> {
    require_root!();

    let fd = tcp_socket();
    let mut session = AuditSession::begin("nt")?;

    let ret = unsafe { libc::listen(fd, 1) };
    assert_eq!(ret, 0);
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!("listen.*{}.*return,success", pid())))?;
    Ok(())
}

#[test]
fn test_listen_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("nt")?;

    let ret = unsafe { libc::listen(-1, 1) };
    assert_eq!(ret, -1);

    session.expect_record(&pat("listen.*0xffffffff.*return,failure"))?;
    Ok(())
}

#[test]
fn test_shutdown_failure() -> Result<()> {
    require_root!();

    // Fresh socket is not connected, so shutdown fails with ENOTCONN.
    let fd = tcp_socket();
    let mut session = AuditSession::begin("nt")?;

    let ret = unsafe { libc::shutdown(fd, libc::SHUT_RDWR) };
    assert_eq!(ret, -1);
    unsafe { libc::close(fd) };

    session.expect_record(&pat(&format!("shutdown.*{}.*return,failure", pid())))?;
    Ok(())
}

#[test]
fn test_accept_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("nt")?;

    let ret = unsafe { libc::accept(-1, std::ptr::null_mut(), std::ptr::null_mut()) };
    assert_eq!(ret, -1);

    session.expect_record(&pat("accept.*0xffffffff.*return,failure"))?;
    Ok(())
}
