//! Domain XML descriptor editing, grounded in `clone.py`'s `lxml`-based
//! rewrite of a `virDomainGetXMLDesc` result: change `/domain/name` and
//! `/domain/uuid`, require the first `device="disk"` entry to be backed by
//! a qcow2 driver, and repoint its `<source file=.../>` at the clone's
//! overlay. MAC-address regeneration is deliberately not implemented here
//! — the original leaves it as an open question and never does it either.

use std::io::Cursor;
use std::path::PathBuf;

use carpetbag_core::error::VmLifecycleError;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// What scanning a domain descriptor for its boot disk found.
pub struct DiskInfo {
    pub backing_file: PathBuf,
}

/// Locate the first `<disk device="disk">` and confirm its driver is
/// qcow2, returning the backing file it points at. Mirrors `clone.py`'s
/// "base VM not using qcow2, don't know what to do" guard.
pub fn find_boot_disk(xml: &str) -> Result<DiskInfo, VmLifecycleError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut in_target_disk = false;
    let mut saw_qcow2 = false;
    let mut backing_file: Option<String> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"disk" => {
                    in_target_disk = attr_is(e, b"device", b"disk");
                    saw_qcow2 = false;
                }
                b"driver" if in_target_disk => {
                    saw_qcow2 = attr_is(e, b"type", b"qcow2");
                }
                b"source" if in_target_disk => {
                    backing_file = attr_value(e, b"file");
                }
                _ => {}
            },
            Event::End(ref e) if e.name().as_ref() == b"disk" && in_target_disk => {
                return match (saw_qcow2, backing_file) {
                    (true, Some(file)) => Ok(DiskInfo {
                        backing_file: PathBuf::from(file),
                    }),
                    (false, _) => Err(VmLifecycleError::UnsupportedDiskFormat),
                    (true, None) => Err(VmLifecycleError::DefineFailed(
                        "qcow2 disk has no source file".to_string(),
                    )),
                };
            }
            _ => {}
        }
        buf.clear();
    }

    Err(VmLifecycleError::UnsupportedDiskFormat)
}

/// Produce the clone's domain descriptor: new name, new uuid, and the boot
/// disk's `source/@file` repointed at `overlay_path`. Everything else
/// passes through untouched.
pub fn rewrite_for_clone(
    xml: &str,
    new_name: &str,
    new_uuid: &str,
    overlay_path: &str,
) -> Result<String, VmLifecycleError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    #[derive(PartialEq)]
    enum Pending {
        None,
        Name,
        Uuid,
    }
    let mut pending = Pending::None;
    let mut in_target_disk = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                match e.name().as_ref() {
                    b"name" => pending = Pending::Name,
                    b"uuid" => pending = Pending::Uuid,
                    b"disk" => in_target_disk = attr_is(e, b"device", b"disk"),
                    _ => {}
                }
                write(&mut writer, Event::Start(e.clone()))?;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"source" && in_target_disk => {
                write(&mut writer, Event::Empty(replace_attr(e, b"file", overlay_path)))?;
            }
            Event::Empty(ref e) => {
                if e.name().as_ref() == b"disk" {
                    in_target_disk = false;
                }
                write(&mut writer, Event::Empty(e.clone()))?;
            }
            Event::Text(ref e) if pending == Pending::Name => {
                write(&mut writer, Event::Text(BytesText::new(new_name)))?;
                pending = Pending::None;
                let _ = e;
            }
            Event::Text(ref e) if pending == Pending::Uuid => {
                write(&mut writer, Event::Text(BytesText::new(new_uuid)))?;
                pending = Pending::None;
                let _ = e;
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"disk" {
                    in_target_disk = false;
                }
                write(&mut writer, Event::End(e.clone()))?;
            }
            other => write(&mut writer, other)?,
        }
        buf.clear();
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event) -> Result<(), VmLifecycleError> {
    writer
        .write_event(event)
        .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))
}

fn attr_is(e: &BytesStart, key: &[u8], expected: &[u8]) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == key && a.value.as_ref() == expected)
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn replace_attr<'a>(e: &BytesStart<'a>, key: &[u8], new_value: &str) -> BytesStart<'static> {
    let mut out = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            out.push_attribute((key, new_value.as_bytes()));
        } else {
            out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<domain type='kvm'>
  <name>carpetbag-golden-x86_64</name>
  <uuid>11111111-1111-1111-1111-111111111111</uuid>
  <devices>
    <disk type='file' device='disk'>
      <driver name='qemu' type='qcow2'/>
      <source file='/var/lib/libvirt/images/golden-x86_64.qcow2'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <disk type='file' device='cdrom'>
      <driver name='qemu' type='raw'/>
      <source file='/var/lib/libvirt/images/seed.iso'/>
    </disk>
  </devices>
</domain>"#;

    #[test]
    fn finds_qcow2_boot_disk() {
        let info = find_boot_disk(SAMPLE).unwrap();
        assert_eq!(
            info.backing_file,
            PathBuf::from("/var/lib/libvirt/images/golden-x86_64.qcow2")
        );
    }

    #[test]
    fn raw_only_disk_is_rejected() {
        const RAW_ONLY: &str = r#"<domain>
  <name>x</name>
  <uuid>y</uuid>
  <devices>
    <disk type='file' device='disk'>
      <driver name='qemu' type='raw'/>
      <source file='/x.img'/>
    </disk>
  </devices>
</domain>"#;
        assert!(matches!(
            find_boot_disk(RAW_ONLY),
            Err(VmLifecycleError::UnsupportedDiskFormat)
        ));
    }

    #[test]
    fn rewrite_updates_name_uuid_and_source_only() {
        let rewritten =
            rewrite_for_clone(SAMPLE, "buildvm_85", "22222222-2222-2222-2222-222222222222", "/var/lib/libvirt/images/buildvm_85.qcow2")
                .unwrap();
        assert!(rewritten.contains("<name>buildvm_85</name>"));
        assert!(rewritten.contains("22222222-2222-2222-2222-222222222222"));
        assert!(rewritten.contains("file=\"/var/lib/libvirt/images/buildvm_85.qcow2\""));
        // the cdrom entry is untouched
        assert!(rewritten.contains("file=\"/var/lib/libvirt/images/seed.iso\""));
    }
}
