//! Privilege check run before anything else

use provision::Error;

/// Effective uid of this process
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() }
}

/// Fail unless running as root
pub fn check() -> Result<(), Error> {
    check_euid(effective_uid())
}

fn check_euid(euid: u32) -> Result<(), Error> {
    if euid == 0 {
        Ok(())
    } else {
        Err(Error::InsufficientPrivilege { euid })
    }
}
