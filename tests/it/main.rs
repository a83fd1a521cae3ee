mod cache;
mod hub_api;
mod permissions;
mod support;
