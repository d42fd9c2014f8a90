mod label_events;
mod pictures;
