use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::param::{BUFFER_SIZE, HTML_GUARD_BAND, MAX_RANGES};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
    #[serde(default = "default_enable_range_requests")]
    enable_range_requests: bool,
    #[serde(default = "default_max_ranges")]
    max_ranges: usize,
}

fn default_buffer_size() -> usize {
    BUFFER_SIZE
}

fn default_enable_range_requests() -> bool {
    true
}

fn default_max_ranges() -> usize {
    MAX_RANGES
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: ".".to_string(),
            port: 7878,
            worker_threads: 0,
            local: true,
            buffer_size: default_buffer_size(),
            enable_range_requests: default_enable_range_requests(),
            max_ranges: default_max_ranges(),
        }
    }

    // 读取失败或解析失败时都退回默认配置
    pub fn from_toml(filename: &str) -> Self {
        let mut str_val = String::new();
        let read = File::open(filename).and_then(|mut file| file.read_to_string(&mut str_val));
        let mut raw_config = match read {
            Ok(_) => match toml::from_str(&str_val) {
                Ok(t) => t,
                Err(e) => {
                    error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                    Config::new()
                }
            },
            Err(e) => {
                error!("无法读取配置文件{}，使用默认配置：{}", filename, e);
                Config::new()
            }
        };
        raw_config.normalize();
        raw_config
    }

    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.buffer_size < HTML_GUARD_BAND {
            warn!(
                "buffer_size被设置为{}，小于转义写入所需的保护带，该值将被改为{}。",
                self.buffer_size, BUFFER_SIZE
            );
            self.buffer_size = BUFFER_SIZE;
        }
        if self.max_ranges == 0 {
            warn!("max_ranges被设置为0，该值将被改为{}。", MAX_RANGES);
            self.max_ranges = MAX_RANGES;
        }
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn enable_range_requests(&self) -> bool {
        self.enable_range_requests
    }

    pub fn max_ranges(&self) -> usize {
        self.max_ranges
    }
}
