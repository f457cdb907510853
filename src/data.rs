use rkyv::{Archive, Serialize};

pub type StringId = u32;
#[allow(dead_code)]
pub type ArchivedStringId = <StringId as Archive>::Archived;

#[derive(Archive, Serialize, Debug, Clone, Copy)]
pub struct Range {
    pub start: u32,
    pub len: u32,
}

#[allow(dead_code)]
impl Range {
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }
}

#[derive(Archive, Serialize, Debug)]
pub struct CreatureRecord {
    pub name: StringId,
    pub taxonomy: StringId,
    pub difficulty: u8,
    pub thumbnails: Range,
}

#[derive(Archive, Serialize, Debug)]
pub struct DatasetRecord {
    pub name: StringId,
    pub creatures: Range,
}

#[derive(Archive, Serialize, Debug)]
pub struct PageScopeRecord {
    pub scope: StringId,
    pub titles: Range,
}

#[derive(Archive, Serialize, Debug)]
pub struct PackedStrings {
    pub offsets: Vec<u32>,
    pub lengths: Vec<u32>,
    pub data: Vec<u8>,
}

#[derive(Archive, Serialize, Debug)]
pub struct DataStore {
    pub strings: PackedStrings,
    pub datasets: Vec<DatasetRecord>,
    pub creatures: Vec<CreatureRecord>,
    pub creature_thumbnails: Vec<StringId>,
    pub page_scopes: Vec<PageScopeRecord>,
    pub page_titles: Vec<StringId>,
}
